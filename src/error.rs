//! Gateway error types with HTTP status code mapping.
//!
//! [`MarketError`] is the central error type for the gateway. Each
//! variant maps to a specific HTTP status code and structured JSON
//! error response. Declined business outcomes — an insufficient-funds
//! debit, a duplicate credit — are *not* errors and never pass through
//! this type on their normal paths.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::PackTier;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid bounding box: west must be less than east",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`MarketError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details (e.g. quota counts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status                |
/// |-----------|---------------------|----------------------------|
/// | 1000–1999 | Validation          | 400 Bad Request            |
/// | 2000–2999 | Not Found           | 404 Not Found              |
/// | 3000–3999 | Server              | 500 Internal Server Error  |
/// | 4000–4999 | Domain rejection    | 401 / 403 / 422            |
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// Request validation failed before any store access.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Listing with the given ID was not found.
    #[error("listing not found: {0}")]
    ListingNotFound(uuid::Uuid),

    /// Agency with the given ID was not found.
    #[error("agency not found: {0}")]
    AgencyNotFound(uuid::Uuid),

    /// Unverified or suspended agency attempting a gated operation.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// The agency's pack listing quota is exhausted.
    #[error("active listing limit reached: {current}/{max}")]
    QuotaExceeded {
        /// Current number of active listings.
        current: u32,
        /// The pack's maximum.
        max: u32,
        /// Suggested upgrade tier, when one exists.
        suggested_tier: Option<PackTier>,
    },

    /// Webhook payload failed signature verification. Hard rejection:
    /// nothing was mutated.
    #[error("webhook signature verification failed")]
    SignatureVerification,

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::ListingNotFound(_) => 2001,
            Self::AgencyNotFound(_) => 2002,
            Self::Authorization(_) => 4001,
            Self::QuotaExceeded { .. } => 4002,
            Self::SignatureVerification => 4003,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::ListingNotFound(_) | Self::AgencyNotFound(_) => StatusCode::NOT_FOUND,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::QuotaExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SignatureVerification => StatusCode::UNAUTHORIZED,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Structured details for variants that carry them.
    #[must_use]
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::QuotaExceeded {
                current,
                max,
                suggested_tier,
            } => Some(serde_json::json!({
                "current": current,
                "max": max,
                "suggested_tier": suggested_tier.map(|t| t.as_str()),
            })),
            _ => None,
        }
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
