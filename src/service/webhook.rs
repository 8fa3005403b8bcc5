//! Webhook ingestion: payment-gateway event verification and dispatch.
//!
//! Every inbound event is authenticated with an HMAC-SHA256 signature
//! computed over the raw, unparsed request body. A mismatch is a hard
//! rejection before any state mutation. After verification, processing
//! failures are logged and swallowed by the handler so the sender's
//! retry loop cannot amplify a transient internal error.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use super::LedgerService;
use crate::domain::{AgencyId, PackTier, PaymentRefs, SubscriptionStatus};
use crate::error::MarketError;
use crate::persistence::{MarketStore, SubscriptionUpdate};

type HmacSha256 = Hmac<Sha256>;

/// A payment-gateway event envelope.
#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    /// Gateway event identifier.
    pub id: String,
    /// Event type discriminator (e.g. `"checkout.session.completed"`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: EventData,
}

/// Payload wrapper, mirroring the gateway's envelope shape.
#[derive(Debug, Deserialize)]
pub struct EventData {
    /// The object the event describes.
    pub object: EventObject,
}

/// The union of object fields the dispatcher reads. Unknown fields are
/// ignored; absent ones default to `None`.
#[derive(Debug, Default, Deserialize)]
pub struct EventObject {
    /// Object identifier (session, subscription, or payment intent).
    #[serde(default)]
    pub id: Option<String>,
    /// Checkout mode: `"payment"` (one-off) or `"subscription"`.
    #[serde(default)]
    pub mode: Option<String>,
    /// Related payment-intent reference.
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Related charge reference.
    #[serde(default)]
    pub latest_charge: Option<String>,
    /// Total amount in the smallest currency unit.
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Received amount (payment-intent events).
    #[serde(default)]
    pub amount_received: Option<i64>,
    /// ISO-4217 currency.
    #[serde(default)]
    pub currency: Option<String>,
    /// Gateway customer reference.
    #[serde(default)]
    pub customer: Option<String>,
    /// Related subscription reference.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Billing period start as a unix timestamp.
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// Free-form metadata set at checkout-session creation.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Computes the `t=...,v1=...` signature header value for a payload.
///
/// Shared with the test suite and local tooling; production senders
/// compute the same MAC on their side.
#[must_use]
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    // HMAC accepts keys of any length; the error branch is unreachable.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    format!("t={timestamp},v1={}", hex::encode(digest))
}

/// Verifies and dispatches payment-gateway notifications.
#[derive(Debug)]
pub struct WebhookService {
    store: Arc<dyn MarketStore>,
    ledger: Arc<LedgerService>,
    secret: String,
    tolerance_secs: i64,
}

impl WebhookService {
    /// Creates a new `WebhookService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn MarketStore>,
        ledger: Arc<LedgerService>,
        secret: String,
        tolerance_secs: i64,
    ) -> Self {
        Self {
            store,
            ledger,
            secret,
            tolerance_secs,
        }
    }

    /// Authenticates a raw payload against its signature header.
    ///
    /// The MAC covers `"{timestamp}.{raw body}"`; the timestamp must be
    /// within the tolerance window. Comparison is constant-time.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::SignatureVerification`] on any mismatch,
    /// malformed header, or stale timestamp.
    pub fn verify_signature(&self, header: &str, body: &[u8]) -> Result<(), MarketError> {
        let (timestamp, signature) =
            parse_signature_header(header).ok_or(MarketError::SignatureVerification)?;

        let now = Utc::now().timestamp();
        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(MarketError::SignatureVerification);
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| MarketError::SignatureVerification)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.verify_slice(&signature)
            .map_err(|_| MarketError::SignatureVerification)
    }

    /// Parses and dispatches a verified payload.
    ///
    /// The caller (the webhook handler) logs any returned error and
    /// still acknowledges the event — returning an error here never
    /// reaches the sender.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] for an unparseable payload
    /// or an unresolvable agency, [`MarketError::Persistence`] on
    /// store failure.
    pub async fn process(&self, body: &[u8]) -> Result<(), MarketError> {
        let event: PaymentEvent = serde_json::from_slice(body)
            .map_err(|e| MarketError::Validation(format!("unparseable event payload: {e}")))?;

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            "processing payment event"
        );

        let object = &event.data.object;
        match event.event_type.as_str() {
            "checkout.session.completed" => {
                if object.mode.as_deref() == Some("subscription") {
                    self.assign_subscription(object, object.subscription.as_deref())
                        .await
                } else {
                    self.credit_one_off(object).await
                }
            }
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.assign_subscription(object, object.id.as_deref()).await
            }
            "customer.subscription.deleted" => {
                let agency_id = self.resolve_agency(object, object.id.as_deref()).await?;
                self.store
                    .update_subscription(agency_id, SubscriptionUpdate::Cancel)
                    .await?;
                tracing::info!(%agency_id, "subscription canceled, agency demoted to free tier");
                Ok(())
            }
            "invoice.paid" => {
                self.update_status(object, SubscriptionStatus::Active).await
            }
            "invoice.payment_failed" => {
                self.update_status(object, SubscriptionStatus::PastDue).await
            }
            "payment_intent.succeeded" => self.credit_from_payment_intent(object).await,
            other => {
                tracing::debug!(event_type = other, "ignoring unhandled event type");
                Ok(())
            }
        }
    }

    /// One-off checkout: idempotent ledger credit keyed on the session
    /// and payment-intent identifiers.
    async fn credit_one_off(&self, object: &EventObject) -> Result<(), MarketError> {
        let agency_id = self.resolve_agency(object, None).await?;
        let amount = object.amount_total.ok_or_else(|| {
            MarketError::Validation("checkout event without amount_total".to_string())
        })?;
        let refs = PaymentRefs {
            payment_intent_id: object.payment_intent.clone(),
            charge_id: None,
            checkout_session_id: object.id.clone(),
        };
        self.ledger
            .credit(
                agency_id,
                amount,
                object.currency.as_deref().unwrap_or("eur"),
                parse_credits(&object.metadata),
                refs,
                "cpc recharge (checkout)",
            )
            .await?;
        Ok(())
    }

    /// Fallback credit path, guarding against a missed checkout event.
    async fn credit_from_payment_intent(&self, object: &EventObject) -> Result<(), MarketError> {
        let agency_id = self.resolve_agency(object, None).await?;
        let amount = object
            .amount_received
            .or(object.amount_total)
            .ok_or_else(|| {
                MarketError::Validation("payment intent event without amount".to_string())
            })?;
        let refs = PaymentRefs {
            payment_intent_id: object.id.clone(),
            charge_id: object.latest_charge.clone(),
            checkout_session_id: None,
        };
        self.ledger
            .credit(
                agency_id,
                amount,
                object.currency.as_deref().unwrap_or("eur"),
                parse_credits(&object.metadata),
                refs,
                "cpc recharge (payment intent)",
            )
            .await?;
        Ok(())
    }

    /// Assigns the pack named in the event metadata and stamps the
    /// billing period start. Idempotent: re-delivery with the same pack
    /// appends no history.
    async fn assign_subscription(
        &self,
        object: &EventObject,
        subscription_ref: Option<&str>,
    ) -> Result<(), MarketError> {
        let agency_id = self.resolve_agency(object, subscription_ref).await?;
        let pack = PackTier::parse_or_free(
            object.metadata.get("pack").map(String::as_str).unwrap_or(""),
        );
        let start_date = object
            .current_period_start
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        self.store
            .update_subscription(
                agency_id,
                SubscriptionUpdate::Assign {
                    pack,
                    start_date,
                    customer_ref: object.customer.clone(),
                    subscription_ref: subscription_ref.map(str::to_string),
                },
            )
            .await?;
        tracing::info!(%agency_id, pack = %pack, "subscription pack assigned");
        Ok(())
    }

    /// Invoice events only touch the provider status, never the ledger.
    async fn update_status(
        &self,
        object: &EventObject,
        status: SubscriptionStatus,
    ) -> Result<(), MarketError> {
        let agency_id = self
            .resolve_agency(object, object.subscription.as_deref())
            .await?;
        self.store
            .update_subscription(agency_id, SubscriptionUpdate::Status(status))
            .await?;
        tracing::info!(%agency_id, ?status, "subscription status updated");
        Ok(())
    }

    /// Resolves the target agency: explicit metadata first, then the
    /// stored subscription reference.
    async fn resolve_agency(
        &self,
        object: &EventObject,
        subscription_ref: Option<&str>,
    ) -> Result<AgencyId, MarketError> {
        if let Some(raw) = object.metadata.get("agency_id")
            && let Ok(uuid) = Uuid::parse_str(raw)
        {
            return Ok(AgencyId::from_uuid(uuid));
        }
        if let Some(sub_ref) = subscription_ref
            && let Some(agency) = self.store.find_agency_by_subscription_ref(sub_ref).await?
        {
            return Ok(agency.id);
        }
        Err(MarketError::Validation(
            "event carries no resolvable agency".to_string(),
        ))
    }
}

fn parse_signature_header(header: &str) -> Option<(i64, Vec<u8>)> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(value)) => timestamp = value.parse().ok(),
            (Some("v1"), Some(value)) => signature = hex::decode(value).ok(),
            _ => {}
        }
    }
    Some((timestamp?, signature?))
}

fn parse_credits(metadata: &HashMap<String, String>) -> Option<i64> {
    metadata.get("credits").and_then(|v| v.parse().ok())
}
