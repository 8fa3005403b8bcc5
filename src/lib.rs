//! # immo-gateway
//!
//! REST API gateway for a real-estate listing marketplace where
//! third-party agencies pay for visibility.
//!
//! The core of this crate is the monetized ranking and billing engine:
//! the logic deciding in what order listings appear for every search
//! request, and the CPC ledger that funds and enforces that ordering.
//! Conventional CRUD surfaces (accounts, moderation, messaging) live
//! elsewhere; this service consumes the shared store and exposes the
//! query/command interfaces around the monetization core.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── SearchService / MapService (service/)
//!     ├── LedgerService / WebhookService / SubmissionService
//!     │
//!     ├── Ranking, Clustering, Pack Policy (domain/)
//!     │
//!     └── MarketStore (persistence/): PostgreSQL or in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
