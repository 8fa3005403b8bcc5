//! Payment-gateway webhook endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::error::{ErrorResponse, MarketError};

/// Header carrying the `t=...,v1=...` signature.
pub const SIGNATURE_HEADER: &str = "x-payment-signature";

/// `POST /webhooks/payment` — Signed payment-gateway events.
///
/// The signature is verified over the raw, unparsed body; a mismatch
/// is a hard 401 before any state mutation. Once verified, the
/// endpoint always acknowledges with 200: processing failures are
/// logged server-side instead of being surfaced to the sender, so its
/// at-least-once retry loop cannot amplify a transient internal error.
///
/// # Errors
///
/// Returns [`MarketError::SignatureVerification`] for a missing or
/// invalid signature.
#[utoipa::path(
    post,
    path = "/webhooks/payment",
    tag = "Webhooks",
    summary = "Ingest a payment event",
    description = "Verifies the HMAC signature over the raw body, then applies ledger credits \
                   and subscription transitions. Always answers 200 once the signature checks \
                   out.",
    request_body(content = String, description = "Raw, unparsed payment-gateway event payload"),
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 401, description = "Signature verification failed", body = ErrorResponse),
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, MarketError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(MarketError::SignatureVerification)?;

    state.webhook.verify_signature(signature, &body)?;

    if let Err(error) = state.webhook.process(&body).await {
        // Deliberate trade-off: a verified event is acknowledged even
        // when processing fails, to stop sender retry storms. The
        // failure is routed to observability instead.
        tracing::error!(%error, "webhook processing failed after signature verification");
    }

    Ok(Json(serde_json::json!({ "received": true })))
}

/// Webhook routes, mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/payment", post(payment_webhook))
}
