//! Agency entity: subscription state and the CPC account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::AgencyId;
use super::pack::PackTier;

/// Payment-provider subscription status, driven by invoice events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid up.
    Active,
    /// Last invoice failed; grace period.
    PastDue,
    /// Subscription ended or was never started.
    Canceled,
}

/// One entry in the subscription audit trail, appended whenever the
/// pack value actually changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackChange {
    /// Tier before the change.
    pub from: PackTier,
    /// Tier after the change.
    pub to: PackTier,
    /// When the change was recorded.
    pub changed_at: DateTime<Utc>,
}

/// Current subscription state for an agency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Current pack tier.
    pub pack: PackTier,
    /// Start of the current billing period.
    pub start_date: Option<DateTime<Utc>>,
    /// Provider status.
    pub status: SubscriptionStatus,
    /// Payment-provider customer reference.
    pub customer_ref: Option<String>,
    /// Payment-provider subscription reference. Used to resolve the
    /// agency when a webhook event carries no metadata.
    pub subscription_ref: Option<String>,
    /// Audit trail of pack changes, oldest first.
    pub history: Vec<PackChange>,
}

impl Subscription {
    /// A fresh free-tier subscription with no provider references.
    #[must_use]
    pub fn free() -> Self {
        Self {
            pack: PackTier::Free,
            start_date: None,
            status: SubscriptionStatus::Canceled,
            customer_ref: None,
            subscription_ref: None,
            history: Vec::new(),
        }
    }
}

/// Pay-per-click account attached to an agency.
///
/// `balance_cents` never goes negative: the ledger refuses any debit
/// that would cross zero. `clicks_this_month` is an advisory counter,
/// not a billing-critical value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpcAccount {
    /// Current balance in euro cents.
    pub balance_cents: i64,
    /// Lifetime spend in euro cents.
    pub total_spent_cents: i64,
    /// Base cost per click in cents, before the pack discount.
    pub cost_per_click_cents: i64,
    /// Best-effort click counter for the current calendar month.
    pub clicks_this_month: u32,
    /// Timestamp of the last applied credit.
    pub last_recharge_at: Option<DateTime<Utc>>,
    /// Last time any CPC field was touched; the month of this value
    /// drives the advisory counter reset.
    pub updated_at: DateTime<Utc>,
}

impl CpcAccount {
    /// An empty account with the given base click price.
    #[must_use]
    pub fn new(cost_per_click_cents: i64) -> Self {
        Self {
            balance_cents: 0,
            total_spent_cents: 0,
            cost_per_click_cents,
            clicks_this_month: 0,
            last_recharge_at: None,
            updated_at: Utc::now(),
        }
    }
}

/// A third-party agency paying for visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agency {
    /// Unique agency identifier.
    pub id: AgencyId,
    /// Display name.
    pub name: String,
    /// Whether the agency passed verification; unverified agencies
    /// cannot submit listings.
    pub verified: bool,
    /// Whether the agency is suspended.
    pub suspended: bool,
    /// Subscription state.
    pub subscription: Subscription,
    /// CPC account.
    pub cpc: CpcAccount,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Agency {
    /// Creates a verified agency on the free tier with an empty CPC
    /// account.
    #[must_use]
    pub fn new(name: impl Into<String>, cost_per_click_cents: i64) -> Self {
        Self {
            id: AgencyId::new(),
            name: name.into(),
            verified: true,
            suspended: false,
            subscription: Subscription::free(),
            cpc: CpcAccount::new(cost_per_click_cents),
            created_at: Utc::now(),
        }
    }

    /// `true` when the agency may submit listings.
    #[must_use]
    pub const fn can_submit(&self) -> bool {
        self.verified && !self.suspended
    }
}
