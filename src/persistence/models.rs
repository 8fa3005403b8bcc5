//! Database row types and their domain conversions.
//!
//! Rows are validated at the store boundary: a row that cannot be
//! mapped onto the domain model is a persistence error, not a silently
//! defaulted document.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{
    Agency, AgencyId, CpcAccount, CpcTransaction, EnergyClass, GeoPoint, Listing, ListingId,
    ListingStatus, PackChange, PackTier, PaymentRefs, PropertyType, Subscription,
    SubscriptionStatus, TransactionKind,
};
use crate::error::MarketError;

/// A listing row from the `listings` table.
#[derive(Debug, Clone, FromRow)]
pub struct ListingRow {
    /// Primary key.
    pub id: Uuid,
    /// Ad title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Property type discriminator string.
    pub property_type: String,
    /// Lifecycle status string.
    pub status: String,
    /// Price in euro cents.
    pub price_cents: i64,
    /// Surface in m².
    pub surface_m2: f64,
    /// Room count.
    pub rooms: Option<i16>,
    /// Renovation score.
    pub renovation_score: Option<i16>,
    /// Annual energy cost in euros.
    pub annual_energy_cost: Option<i32>,
    /// DPE class letter.
    pub dpe_class: Option<String>,
    /// GES class letter.
    pub ges_class: Option<String>,
    /// Coproperty flag.
    pub in_coproperty: bool,
    /// City name.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// Department code.
    pub department: String,
    /// Latitude, when geocoded.
    pub lat: Option<f64>,
    /// Longitude, when geocoded.
    pub lon: Option<f64>,
    /// Approximate-location flag.
    pub approximate_location: bool,
    /// Owning agency.
    pub agency_id: Option<Uuid>,
    /// Submission timestamp.
    pub published_at: DateTime<Utc>,
    /// Sponsorship flag.
    pub is_sponsored: bool,
    /// Sponsorship window start.
    pub sponsored_at: Option<DateTime<Utc>>,
    /// Sponsorship window end.
    pub sponsored_until: Option<DateTime<Utc>>,
    /// Policy-granted boost flag.
    pub auto_boost_applied: bool,
    /// Boost recurrence flag.
    pub auto_boost_recurrent: bool,
}

impl TryFrom<ListingRow> for Listing {
    type Error = MarketError;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        let property_type = PropertyType::parse(&row.property_type).ok_or_else(|| {
            MarketError::Persistence(format!(
                "listing {}: unknown property type {:?}",
                row.id, row.property_type
            ))
        })?;
        let point = match (row.lat, row.lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        };
        Ok(Self {
            id: ListingId::from_uuid(row.id),
            title: row.title,
            description: row.description,
            property_type,
            status: ListingStatus::parse(&row.status),
            price_cents: row.price_cents,
            surface_m2: row.surface_m2,
            rooms: row.rooms.map(|r| r.max(0) as u8),
            renovation_score: row.renovation_score.map(|r| r.max(0) as u8),
            annual_energy_cost: row.annual_energy_cost,
            dpe_class: row.dpe_class.as_deref().and_then(EnergyClass::parse),
            ges_class: row.ges_class.as_deref().and_then(EnergyClass::parse),
            in_coproperty: row.in_coproperty,
            city: row.city,
            postal_code: row.postal_code,
            department: row.department,
            point,
            approximate_location: row.approximate_location,
            agency_id: row.agency_id.map(AgencyId::from_uuid),
            published_at: row.published_at,
            is_sponsored: row.is_sponsored,
            sponsored_at: row.sponsored_at,
            sponsored_until: row.sponsored_until,
            auto_boost_applied: row.auto_boost_applied,
            auto_boost_recurrent: row.auto_boost_recurrent,
        })
    }
}

/// An agency row from the `agencies` table.
#[derive(Debug, Clone, FromRow)]
pub struct AgencyRow {
    /// Primary key.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Verification flag.
    pub verified: bool,
    /// Suspension flag.
    pub suspended: bool,
    /// Current pack tier string.
    pub pack: String,
    /// Billing period start.
    pub subscription_start: Option<DateTime<Utc>>,
    /// Provider status string.
    pub subscription_status: String,
    /// Provider customer reference.
    pub customer_ref: Option<String>,
    /// Provider subscription reference.
    pub subscription_ref: Option<String>,
    /// Pack change audit trail as JSONB.
    pub history: serde_json::Value,
    /// CPC balance in cents.
    pub balance_cents: i64,
    /// Lifetime CPC spend in cents.
    pub total_spent_cents: i64,
    /// Base cost per click in cents.
    pub cost_per_click_cents: i64,
    /// Advisory monthly click counter.
    pub clicks_this_month: i32,
    /// Last credit timestamp.
    pub last_recharge_at: Option<DateTime<Utc>>,
    /// Last CPC account touch.
    pub cpc_updated_at: DateTime<Utc>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AgencyRow> for Agency {
    type Error = MarketError;

    #[allow(clippy::cast_sign_loss)]
    fn try_from(row: AgencyRow) -> Result<Self, Self::Error> {
        let history: Vec<PackChange> = serde_json::from_value(row.history).map_err(|e| {
            MarketError::Persistence(format!("agency {}: bad history payload: {e}", row.id))
        })?;
        let status = match row.subscription_status.as_str() {
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            _ => SubscriptionStatus::Canceled,
        };
        Ok(Self {
            id: AgencyId::from_uuid(row.id),
            name: row.name,
            verified: row.verified,
            suspended: row.suspended,
            subscription: Subscription {
                pack: PackTier::parse_or_free(&row.pack),
                start_date: row.subscription_start,
                status,
                customer_ref: row.customer_ref,
                subscription_ref: row.subscription_ref,
                history,
            },
            cpc: CpcAccount {
                balance_cents: row.balance_cents,
                total_spent_cents: row.total_spent_cents,
                cost_per_click_cents: row.cost_per_click_cents,
                clicks_this_month: row.clicks_this_month.max(0) as u32,
                last_recharge_at: row.last_recharge_at,
                updated_at: row.cpc_updated_at,
            },
            created_at: row.created_at,
        })
    }
}

/// A ledger row from the `cpc_transactions` table.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning agency.
    pub agency_id: Uuid,
    /// `"credit"` or `"debit"`.
    pub kind: String,
    /// Amount in cents.
    pub amount_cents: i64,
    /// ISO-4217 currency.
    pub currency: String,
    /// Prepaid clicks granted, when present.
    pub credits_added: Option<i64>,
    /// Human-readable description.
    pub description: String,
    /// Payment-intent reference.
    pub payment_intent_id: Option<String>,
    /// Charge reference.
    pub charge_id: Option<String>,
    /// Checkout-session reference.
    pub checkout_session_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<TransactionRow> for CpcTransaction {
    fn from(row: TransactionRow) -> Self {
        let kind = if row.kind == "debit" {
            TransactionKind::Debit
        } else {
            TransactionKind::Credit
        };
        Self {
            id: row.id,
            agency_id: AgencyId::from_uuid(row.agency_id),
            kind,
            amount_cents: row.amount_cents,
            currency: row.currency,
            credits_added: row.credits_added,
            description: row.description,
            refs: PaymentRefs {
                payment_intent_id: row.payment_intent_id,
                charge_id: row.charge_id,
                checkout_session_id: row.checkout_session_id,
            },
            created_at: row.created_at,
        }
    }
}
