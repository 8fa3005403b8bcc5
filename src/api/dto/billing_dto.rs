//! Billing endpoint DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /billing/recharge`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RechargeRequest {
    /// Agency to recharge.
    pub agency_id: uuid::Uuid,
    /// Requested amount in euro cents.
    pub amount_cents: i64,
}

/// Response body for `POST /billing/recharge` (202 Accepted).
///
/// The balance is never credited from this call: the client is
/// directed to the payment gateway's checkout flow, and the credit
/// lands when the gateway's webhook confirms the payment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RechargeResponse {
    /// Always `"pending_checkout"`.
    pub status: String,
    /// Echo of the target agency.
    pub agency_id: uuid::Uuid,
    /// Echo of the requested amount.
    pub amount_cents: i64,
    /// Operator guidance.
    pub message: String,
}

/// Response body for `GET /billing/{agency_id}/balance`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Agency identifier.
    pub agency_id: uuid::Uuid,
    /// Current CPC balance in cents.
    pub balance_cents: i64,
    /// Lifetime spend in cents.
    pub total_spent_cents: i64,
    /// Base cost per click in cents.
    pub cost_per_click_cents: i64,
    /// Cost per click after the pack discount, in cents.
    pub effective_cost_per_click_cents: i64,
    /// Advisory click counter for the current month.
    pub clicks_this_month: u32,
    /// Last credit timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_recharge_at: Option<DateTime<Utc>>,
    /// Current pack tier string.
    pub pack: String,
}
