//! Persistence layer: the [`MarketStore`] abstraction over listings,
//! agencies, and the CPC transaction log.
//!
//! Two backends implement the same contract: [`postgres::PostgresStore`]
//! for production and [`memory::MemoryStore`] for tests and local
//! development. The contract encodes the two operations whose semantics
//! are load-bearing:
//!
//! - [`MarketStore::try_debit`] is a *single atomic conditional*
//!   operation — decrement only if the balance covers the amount —
//!   never a separate read followed by a write.
//! - [`MarketStore::record_credit`] is idempotent on the external
//!   payment references, enforced structurally by the backend.
//!
//! Store initialization is an explicit lifecycle step
//! ([`MarketStore::init`]) invoked once at process start.

pub mod memory;
pub mod models;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Agency, AgencyId, BoundingBox, CpcTransaction, EnergyClass, Listing, ListingId, PackTier,
    PropertyType, SubscriptionStatus,
};
use crate::error::MarketError;

/// Filter parameters applied when fetching search/map candidates.
///
/// Only `Active` listings ever match. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    /// Case-insensitive substring match on title and description.
    pub text: Option<String>,
    /// Exact city match (case-insensitive).
    pub city: Option<String>,
    /// Exact postal-code match.
    pub postal_code: Option<String>,
    /// Property types to include; empty means all.
    pub property_types: Vec<PropertyType>,
    /// Minimum price in cents.
    pub price_min: Option<i64>,
    /// Maximum price in cents.
    pub price_max: Option<i64>,
    /// Minimum surface in m².
    pub surface_min: Option<f64>,
    /// Maximum surface in m².
    pub surface_max: Option<f64>,
    /// Minimum room count.
    pub rooms_min: Option<u8>,
    /// Minimum renovation score.
    pub renovation_min: Option<u8>,
    /// Maximum annual energy cost in euros.
    pub energy_cost_max: Option<i32>,
    /// Worst acceptable DPE class.
    pub dpe_max: Option<EnergyClass>,
    /// Worst acceptable GES class.
    pub ges_max: Option<EnergyClass>,
    /// Coproperty membership filter.
    pub in_coproperty: Option<bool>,
    /// Viewport restriction (map queries).
    pub bbox: Option<BoundingBox>,
    /// Maximum candidates to return; `None` means unbounded.
    pub limit: Option<usize>,
}

impl ListingQuery {
    /// Returns `true` if `listing` satisfies every set filter.
    ///
    /// The in-memory backend evaluates candidates with this predicate;
    /// the PostgreSQL backend compiles the same conditions to SQL.
    #[must_use]
    pub fn matches(&self, listing: &Listing) -> bool {
        if listing.status != crate::domain::ListingStatus::Active {
            return false;
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let haystack =
                format!("{} {}", listing.title.to_lowercase(), listing.description.to_lowercase());
            if !haystack.contains(&needle) {
                return false;
            }
        }
        if let Some(city) = &self.city
            && !listing.city.eq_ignore_ascii_case(city)
        {
            return false;
        }
        if let Some(postal) = &self.postal_code
            && listing.postal_code != *postal
        {
            return false;
        }
        if !self.property_types.is_empty() && !self.property_types.contains(&listing.property_type)
        {
            return false;
        }
        if let Some(min) = self.price_min
            && listing.price_cents < min
        {
            return false;
        }
        if let Some(max) = self.price_max
            && listing.price_cents > max
        {
            return false;
        }
        if let Some(min) = self.surface_min
            && listing.surface_m2 < min
        {
            return false;
        }
        if let Some(max) = self.surface_max
            && listing.surface_m2 > max
        {
            return false;
        }
        if let Some(min) = self.rooms_min
            && listing.rooms.unwrap_or(0) < min
        {
            return false;
        }
        if let Some(min) = self.renovation_min
            && listing.renovation_score.unwrap_or(0) < min
        {
            return false;
        }
        if let Some(max) = self.energy_cost_max
            && listing.annual_energy_cost.is_some_and(|c| c > max)
        {
            return false;
        }
        if let Some(worst) = self.dpe_max
            && listing.dpe_class.is_some_and(|c| c > worst)
        {
            return false;
        }
        if let Some(worst) = self.ges_max
            && listing.ges_class.is_some_and(|c| c > worst)
        {
            return false;
        }
        if let Some(copro) = self.in_coproperty
            && listing.in_coproperty != copro
        {
            return false;
        }
        if let Some(bbox) = &self.bbox {
            let Some(point) = listing.point else {
                return false;
            };
            if !bbox.contains(&point) {
                return false;
            }
        }
        true
    }
}

/// Result of a credit application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditOutcome {
    /// `false` when the external reference was already recorded.
    pub applied: bool,
    /// `"duplicate"` on the idempotent no-op path.
    pub reason: Option<&'static str>,
    /// Balance after the credit, when applied.
    pub new_balance_cents: Option<i64>,
}

impl CreditOutcome {
    /// The idempotent no-op outcome for a re-delivered payment event.
    #[must_use]
    pub const fn duplicate() -> Self {
        Self {
            applied: false,
            reason: Some("duplicate"),
            new_balance_cents: None,
        }
    }

    /// A successfully applied credit.
    #[must_use]
    pub const fn applied(new_balance_cents: i64) -> Self {
        Self {
            applied: true,
            reason: None,
            new_balance_cents: Some(new_balance_cents),
        }
    }
}

/// Result of a conditional debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebitOutcome {
    /// `false` when the balance did not cover the amount.
    pub applied: bool,
    /// Balance after the debit, when applied.
    pub new_balance_cents: Option<i64>,
}

/// Subscription transition driven by a webhook event.
///
/// Transitions are written idempotently — webhook delivery has no
/// ordering guarantee, so each variant fully describes the target
/// state rather than assuming sequential application.
#[derive(Debug, Clone)]
pub enum SubscriptionUpdate {
    /// Assign (or re-assign) a pack from a checkout or subscription
    /// event. Appends a history entry only when the pack changes.
    Assign {
        /// Target tier.
        pack: PackTier,
        /// Billing period start.
        start_date: DateTime<Utc>,
        /// Provider customer reference, when known.
        customer_ref: Option<String>,
        /// Provider subscription reference, when known.
        subscription_ref: Option<String>,
    },
    /// Demote to the free tier and clear provider references.
    Cancel,
    /// Update the provider status only (invoice events).
    Status(SubscriptionStatus),
}

/// The shared persistent store. All entry points are stateless request
/// handlers; this is the only shared resource between them.
#[async_trait]
pub trait MarketStore: Send + Sync + std::fmt::Debug {
    /// One-time storage initialization (schema migration, indices).
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] when the backing store is
    /// unreachable or the migration fails.
    async fn init(&self) -> Result<(), MarketError>;

    /// Inserts a new listing.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn insert_listing(&self, listing: &Listing) -> Result<(), MarketError>;

    /// Fetches a listing by id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, MarketError>;

    /// Returns active listings matching `query`, up to `query.limit`.
    ///
    /// Ordering is backend-defined except that sponsored listings come
    /// first, so a truncated fetch never starves them.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn search_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, MarketError>;

    /// Counts an agency's active listings (quota enforcement).
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn count_active_listings(&self, agency_id: AgencyId) -> Result<u32, MarketError>;

    /// Inserts a new agency.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn insert_agency(&self, agency: &Agency) -> Result<(), MarketError>;

    /// Fetches an agency by id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn get_agency(&self, id: AgencyId) -> Result<Option<Agency>, MarketError>;

    /// Batch-fetches agencies by distinct id — the enrichment path
    /// issues one lookup per request, not one per listing.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn get_agencies(
        &self,
        ids: &[AgencyId],
    ) -> Result<HashMap<AgencyId, Agency>, MarketError>;

    /// Resolves an agency from a stored provider subscription
    /// reference (webhook fallback path).
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn find_agency_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<Agency>, MarketError>;

    /// Applies a subscription transition.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::AgencyNotFound`] for an unknown agency,
    /// [`MarketError::Persistence`] on store failure.
    async fn update_subscription(
        &self,
        agency_id: AgencyId,
        update: SubscriptionUpdate,
    ) -> Result<(), MarketError>;

    /// Records a credit transaction and increments the balance, unless
    /// any of the transaction's external references was already seen —
    /// the sole idempotency guard against repeated payment
    /// notifications.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::AgencyNotFound`] for an unknown agency,
    /// [`MarketError::Persistence`] on store failure. A duplicate is
    /// *not* an error: it yields [`CreditOutcome::duplicate`].
    async fn record_credit(&self, tx: &CpcTransaction) -> Result<CreditOutcome, MarketError>;

    /// Atomically decrements the balance if it covers `amount_cents`.
    ///
    /// The check and the decrement are one conditional store operation;
    /// concurrent debits can never drive the balance negative.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    /// Insufficient funds is a declined outcome, not an error.
    async fn try_debit(
        &self,
        agency_id: AgencyId,
        amount_cents: i64,
    ) -> Result<DebitOutcome, MarketError>;

    /// Appends a debit entry to the transaction log.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn record_debit(&self, tx: &CpcTransaction) -> Result<(), MarketError>;

    /// Advisory monthly click counter: reset to 1 when the account's
    /// last-touched month differs from `now`'s, else incremented.
    /// Drift under concurrent writes is tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn bump_click_counter(
        &self,
        agency_id: AgencyId,
        now: DateTime<Utc>,
    ) -> Result<u32, MarketError>;

    /// Returns the ledger entries for an agency, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    async fn transactions_for(
        &self,
        agency_id: AgencyId,
    ) -> Result<Vec<CpcTransaction>, MarketError>;
}
