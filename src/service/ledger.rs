//! CPC ledger service: credits funded by payment events, debits
//! triggered by sponsored clicks.
//!
//! Duplicate external references and insufficient balances are normal,
//! expected paths here — only store-unreachable conditions surface as
//! errors.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{AgencyId, CpcTransaction, Listing, PaymentRefs, pack};
use crate::error::MarketError;
use crate::persistence::{CreditOutcome, MarketStore};

/// Outcome of one click-billing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickBilling {
    /// `true` when a debit was applied.
    pub billed: bool,
    /// The discounted click price, when a billable context existed.
    pub price_cents: Option<i64>,
    /// Balance after the debit, when applied.
    pub new_balance_cents: Option<i64>,
}

impl ClickBilling {
    const fn unbilled() -> Self {
        Self {
            billed: false,
            price_cents: None,
            new_balance_cents: None,
        }
    }
}

/// Owns every mutation of an agency's monetary balance.
#[derive(Debug)]
pub struct LedgerService {
    store: Arc<dyn MarketStore>,
}

impl LedgerService {
    /// Creates a new `LedgerService`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Applies a credit funded by a verified payment event.
    ///
    /// Idempotent on the external payment references: a re-delivered
    /// notification yields [`CreditOutcome::duplicate`] without any
    /// balance change.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] when no external reference
    /// is present, [`MarketError::AgencyNotFound`] for an unknown
    /// agency, [`MarketError::Persistence`] on store failure.
    pub async fn credit(
        &self,
        agency_id: AgencyId,
        amount_cents: i64,
        currency: &str,
        credits_added: Option<i64>,
        refs: PaymentRefs,
        description: &str,
    ) -> Result<CreditOutcome, MarketError> {
        if !refs.is_keyed() {
            return Err(MarketError::Validation(
                "credit requires at least one external payment reference".to_string(),
            ));
        }
        if amount_cents <= 0 {
            return Err(MarketError::Validation(format!(
                "credit amount must be positive, got {amount_cents}"
            )));
        }

        let tx = CpcTransaction::credit(
            agency_id,
            amount_cents,
            currency,
            credits_added,
            refs,
            description,
        );
        let outcome = self.store.record_credit(&tx).await?;
        if outcome.applied {
            tracing::info!(
                %agency_id,
                amount_cents,
                new_balance = outcome.new_balance_cents,
                "cpc credit applied"
            );
        } else {
            tracing::info!(%agency_id, amount_cents, "duplicate payment notification ignored");
        }
        Ok(outcome)
    }

    /// Bills one click on a sponsored listing.
    ///
    /// A listing outside its sponsorship window, without an owning
    /// agency, or whose agency cannot cover the discounted price
    /// produces an unbilled outcome — never an error, and never a
    /// failed page view for the visitor.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on store failure.
    pub async fn bill_click(&self, listing: &Listing) -> Result<ClickBilling, MarketError> {
        let now = Utc::now();
        if !listing.is_currently_sponsored(now) {
            return Ok(ClickBilling::unbilled());
        }
        let Some(agency_id) = listing.agency_id else {
            return Ok(ClickBilling::unbilled());
        };
        let Some(agency) = self.store.get_agency(agency_id).await? else {
            return Ok(ClickBilling::unbilled());
        };

        let price = pack::effective_cpc_price(
            agency.subscription.pack,
            agency.cpc.cost_per_click_cents,
        );
        if price <= 0 {
            return Ok(ClickBilling::unbilled());
        }

        let outcome = self.store.try_debit(agency_id, price).await?;
        if !outcome.applied {
            tracing::info!(
                %agency_id,
                listing_id = %listing.id,
                price_cents = price,
                "click debit declined: insufficient balance"
            );
            return Ok(ClickBilling {
                billed: false,
                price_cents: Some(price),
                new_balance_cents: None,
            });
        }

        let tx = CpcTransaction::debit(
            agency_id,
            price,
            format!("sponsored click on listing {}", listing.id),
        );
        self.store.record_debit(&tx).await?;
        let clicks = self.store.bump_click_counter(agency_id, now).await?;

        tracing::debug!(
            %agency_id,
            listing_id = %listing.id,
            price_cents = price,
            clicks_this_month = clicks,
            "click billed"
        );
        Ok(ClickBilling {
            billed: true,
            price_cents: Some(price),
            new_balance_cents: outcome.new_balance_cents,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::{Agency, ListingId, ListingStatus, PackTier, PropertyType};
    use crate::persistence::memory::MemoryStore;

    fn sponsored_listing(agency_id: Option<AgencyId>) -> Listing {
        let now = Utc::now();
        Listing {
            id: ListingId::new(),
            title: "Maison avec jardin".to_string(),
            description: String::new(),
            property_type: PropertyType::House,
            status: ListingStatus::Active,
            price_cents: 30_000_000,
            surface_m2: 120.0,
            rooms: Some(5),
            renovation_score: Some(6),
            annual_energy_cost: None,
            dpe_class: None,
            ges_class: None,
            in_coproperty: false,
            city: "Rennes".to_string(),
            postal_code: "35000".to_string(),
            department: "35".to_string(),
            point: None,
            approximate_location: false,
            agency_id,
            published_at: now,
            is_sponsored: true,
            sponsored_at: Some(now - Duration::hours(1)),
            sponsored_until: Some(now + Duration::hours(1)),
            auto_boost_applied: false,
            auto_boost_recurrent: false,
        }
    }

    async fn setup(balance: i64, pack: PackTier) -> (LedgerService, Arc<MemoryStore>, AgencyId) {
        let store = Arc::new(MemoryStore::new());
        let mut agency = Agency::new("Agence des Lices", 50);
        agency.subscription.pack = pack;
        agency.cpc.balance_cents = balance;
        let id = agency.id;
        let Ok(()) = store.insert_agency(&agency).await else {
            panic!("insert failed");
        };
        let ledger = LedgerService::new(Arc::clone(&store) as Arc<dyn MarketStore>);
        (ledger, store, id)
    }

    #[tokio::test]
    async fn click_debits_discounted_price() {
        // Premium discount: 20% off the base 50 cents.
        let (ledger, store, agency_id) = setup(1_000, PackTier::Premium).await;
        let listing = sponsored_listing(Some(agency_id));

        let Ok(billing) = ledger.bill_click(&listing).await else {
            panic!("billing failed");
        };
        assert!(billing.billed);
        assert_eq!(billing.price_cents, Some(40));
        assert_eq!(billing.new_balance_cents, Some(960));

        let Ok(txs) = store.transactions_for(agency_id).await else {
            panic!("transactions failed");
        };
        assert_eq!(txs.len(), 1);
    }

    #[tokio::test]
    async fn insufficient_funds_declines_quietly() {
        let (ledger, store, agency_id) = setup(10, PackTier::Free).await;
        let listing = sponsored_listing(Some(agency_id));

        let Ok(billing) = ledger.bill_click(&listing).await else {
            panic!("billing failed");
        };
        assert!(!billing.billed);
        assert_eq!(billing.price_cents, Some(50));

        let Ok(Some(agency)) = store.get_agency(agency_id).await else {
            panic!("agency missing");
        };
        assert_eq!(agency.cpc.balance_cents, 10);
        let Ok(txs) = store.transactions_for(agency_id).await else {
            panic!("transactions failed");
        };
        assert!(txs.is_empty());
    }

    #[tokio::test]
    async fn unsponsored_click_is_free() {
        let (ledger, _, agency_id) = setup(1_000, PackTier::Free).await;
        let mut listing = sponsored_listing(Some(agency_id));
        listing.sponsored_until = Some(Utc::now() - Duration::minutes(5));

        let Ok(billing) = ledger.bill_click(&listing).await else {
            panic!("billing failed");
        };
        assert!(!billing.billed);
        assert!(billing.price_cents.is_none());
    }

    #[tokio::test]
    async fn agency_less_click_is_free() {
        let (ledger, _, _) = setup(1_000, PackTier::Free).await;
        let listing = sponsored_listing(None);
        let Ok(billing) = ledger.bill_click(&listing).await else {
            panic!("billing failed");
        };
        assert!(!billing.billed);
    }

    #[tokio::test]
    async fn credit_requires_external_reference() {
        let (ledger, _, agency_id) = setup(0, PackTier::Free).await;
        let result = ledger
            .credit(agency_id, 1000, "eur", None, PaymentRefs::default(), "x")
            .await;
        assert!(matches!(result, Err(MarketError::Validation(_))));
    }

    #[tokio::test]
    async fn double_delivery_credits_once() {
        let (ledger, store, agency_id) = setup(0, PackTier::Free).await;
        let refs = PaymentRefs {
            checkout_session_id: Some("cs_77".to_string()),
            ..PaymentRefs::default()
        };

        let Ok(first) = ledger
            .credit(agency_id, 2_000, "eur", Some(40), refs.clone(), "recharge")
            .await
        else {
            panic!("credit failed");
        };
        assert!(first.applied);

        let Ok(second) = ledger
            .credit(agency_id, 2_000, "eur", Some(40), refs, "recharge")
            .await
        else {
            panic!("credit failed");
        };
        assert!(!second.applied);
        assert_eq!(second.reason, Some("duplicate"));

        let Ok(Some(agency)) = store.get_agency(agency_id).await else {
            panic!("agency missing");
        };
        assert_eq!(agency.cpc.balance_cents, 2_000);
    }
}
