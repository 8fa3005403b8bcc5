//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::persistence::MarketStore;
use crate::service::{LedgerService, MapService, SearchService, SubmissionService, WebhookService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Listing search orchestration.
    pub search: Arc<SearchService>,
    /// Map viewport clustering.
    pub map: Arc<MapService>,
    /// CPC balance mutations.
    pub ledger: Arc<LedgerService>,
    /// Listing submission under pack policy.
    pub submission: Arc<SubmissionService>,
    /// Payment-gateway event ingestion.
    pub webhook: Arc<WebhookService>,
    /// Direct store access for simple read endpoints.
    pub store: Arc<dyn MarketStore>,
}
