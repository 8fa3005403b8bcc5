//! Immutable CPC ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::AgencyId;

/// Ledger entry direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Balance increase funded by an external payment.
    Credit,
    /// Balance decrease from a sponsored click.
    Debit,
}

impl TransactionKind {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

/// External payment identifiers forming the idempotency key of a
/// credit.
///
/// Webhook delivery is at-least-once, so no two transactions may share
/// any of these identifiers — enforced structurally by the store
/// (unique constraints), not just by application logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRefs {
    /// Payment-intent identifier.
    pub payment_intent_id: Option<String>,
    /// Charge identifier.
    pub charge_id: Option<String>,
    /// Checkout-session identifier.
    pub checkout_session_id: Option<String>,
}

impl PaymentRefs {
    /// `true` when at least one external identifier is present.
    #[must_use]
    pub const fn is_keyed(&self) -> bool {
        self.payment_intent_id.is_some()
            || self.charge_id.is_some()
            || self.checkout_session_id.is_some()
    }

    /// Iterates over the identifiers that are present.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.payment_intent_id
            .as_deref()
            .into_iter()
            .chain(self.charge_id.as_deref())
            .chain(self.checkout_session_id.as_deref())
    }
}

/// An immutable ledger entry. Created only by the ledger; never updated
/// or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpcTransaction {
    /// Unique transaction identifier.
    pub id: Uuid,
    /// Agency whose account this entry touches.
    pub agency_id: AgencyId,
    /// Credit or debit.
    pub kind: TransactionKind,
    /// Amount in the smallest currency unit (euro cents).
    pub amount_cents: i64,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Prepaid clicks granted by the credit, when the payment carried
    /// that metadata.
    pub credits_added: Option<i64>,
    /// Human-readable description.
    pub description: String,
    /// Idempotency key; empty for debits.
    pub refs: PaymentRefs,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl CpcTransaction {
    /// Builds a credit entry from a verified payment event.
    #[must_use]
    pub fn credit(
        agency_id: AgencyId,
        amount_cents: i64,
        currency: impl Into<String>,
        credits_added: Option<i64>,
        refs: PaymentRefs,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agency_id,
            kind: TransactionKind::Credit,
            amount_cents,
            currency: currency.into(),
            credits_added,
            description: description.into(),
            refs,
            created_at: Utc::now(),
        }
    }

    /// Builds a debit entry for a billed click.
    #[must_use]
    pub fn debit(agency_id: AgencyId, amount_cents: i64, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agency_id,
            kind: TransactionKind::Debit,
            amount_cents,
            currency: "eur".to_string(),
            credits_added: None,
            description: description.into(),
            refs: PaymentRefs::default(),
            created_at: Utc::now(),
        }
    }
}
