//! Service layer: business logic orchestration.
//!
//! Each service is a stateless coordinator over the shared
//! [`MarketStore`](crate::persistence::MarketStore): search and map are
//! read-only and safely parallelizable, the ledger owns every balance
//! mutation, the webhook service drives credits and subscription
//! transitions, and the submission service applies quota and
//! auto-boost policy.

pub mod ledger;
pub mod map;
pub mod search;
pub mod submission;
pub mod webhook;

use std::collections::HashMap;

use crate::domain::{Agency, AgencyId, Listing};
use crate::error::MarketError;
use crate::persistence::MarketStore;

pub use ledger::LedgerService;
pub use map::MapService;
pub use search::SearchService;
pub use submission::SubmissionService;
pub use webhook::WebhookService;

/// Batch-fetches the owning agencies of `listings` by distinct id —
/// one store round-trip per request, not one per listing.
pub(crate) async fn fetch_owners(
    store: &dyn MarketStore,
    listings: &[Listing],
) -> Result<HashMap<AgencyId, Agency>, MarketError> {
    let mut ids: Vec<AgencyId> = listings.iter().filter_map(|l| l.agency_id).collect();
    ids.sort_unstable_by_key(|id| *id.as_uuid());
    ids.dedup();
    store.get_agencies(&ids).await
}
