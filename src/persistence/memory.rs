//! In-memory [`MarketStore`] backend.
//!
//! Used by the test suite and as the local-development backend. A
//! single mutex over the whole state makes every store call one
//! atomic step, which is exactly the contract the conditional debit
//! and the idempotent credit require.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use super::{CreditOutcome, DebitOutcome, ListingQuery, MarketStore, SubscriptionUpdate};
use crate::domain::{
    Agency, AgencyId, CpcTransaction, Listing, ListingId, ListingStatus, PackChange, PackTier,
    SubscriptionStatus,
};
use crate::error::MarketError;

#[derive(Debug, Default)]
struct MemoryState {
    listings: HashMap<ListingId, Listing>,
    agencies: HashMap<AgencyId, Agency>,
    transactions: Vec<CpcTransaction>,
    seen_refs: HashSet<String>,
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> Result<T, MarketError>,
    ) -> Result<T, MarketError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| MarketError::Persistence("memory store poisoned".to_string()))?;
        f(&mut state)
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn init(&self) -> Result<(), MarketError> {
        Ok(())
    }

    async fn insert_listing(&self, listing: &Listing) -> Result<(), MarketError> {
        self.locked(|state| {
            state.listings.insert(listing.id, listing.clone());
            Ok(())
        })
    }

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, MarketError> {
        self.locked(|state| Ok(state.listings.get(&id).cloned()))
    }

    async fn search_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, MarketError> {
        let now = Utc::now();
        self.locked(|state| {
            let mut matched: Vec<Listing> = state
                .listings
                .values()
                .filter(|l| query.matches(l))
                .cloned()
                .collect();
            // Sponsored first so a truncated fetch never starves them.
            matched.sort_by(|a, b| {
                b.is_currently_sponsored(now)
                    .cmp(&a.is_currently_sponsored(now))
                    .then_with(|| b.published_at.cmp(&a.published_at))
            });
            if let Some(limit) = query.limit {
                matched.truncate(limit);
            }
            Ok(matched)
        })
    }

    async fn count_active_listings(&self, agency_id: AgencyId) -> Result<u32, MarketError> {
        self.locked(|state| {
            let count = state
                .listings
                .values()
                .filter(|l| l.agency_id == Some(agency_id) && l.status == ListingStatus::Active)
                .count();
            Ok(u32::try_from(count).unwrap_or(u32::MAX))
        })
    }

    async fn insert_agency(&self, agency: &Agency) -> Result<(), MarketError> {
        self.locked(|state| {
            state.agencies.insert(agency.id, agency.clone());
            Ok(())
        })
    }

    async fn get_agency(&self, id: AgencyId) -> Result<Option<Agency>, MarketError> {
        self.locked(|state| Ok(state.agencies.get(&id).cloned()))
    }

    async fn get_agencies(
        &self,
        ids: &[AgencyId],
    ) -> Result<HashMap<AgencyId, Agency>, MarketError> {
        self.locked(|state| {
            Ok(ids
                .iter()
                .filter_map(|id| state.agencies.get(id).map(|a| (*id, a.clone())))
                .collect())
        })
    }

    async fn find_agency_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<Agency>, MarketError> {
        self.locked(|state| {
            Ok(state
                .agencies
                .values()
                .find(|a| a.subscription.subscription_ref.as_deref() == Some(subscription_ref))
                .cloned())
        })
    }

    async fn update_subscription(
        &self,
        agency_id: AgencyId,
        update: SubscriptionUpdate,
    ) -> Result<(), MarketError> {
        self.locked(|state| {
            let agency = state
                .agencies
                .get_mut(&agency_id)
                .ok_or_else(|| MarketError::AgencyNotFound(*agency_id.as_uuid()))?;
            apply_subscription_update(agency, update);
            Ok(())
        })
    }

    async fn record_credit(&self, tx: &CpcTransaction) -> Result<CreditOutcome, MarketError> {
        self.locked(|state| {
            if tx.refs.iter().any(|r| state.seen_refs.contains(r)) {
                return Ok(CreditOutcome::duplicate());
            }
            let agency = state
                .agencies
                .get_mut(&tx.agency_id)
                .ok_or_else(|| MarketError::AgencyNotFound(*tx.agency_id.as_uuid()))?;
            agency.cpc.balance_cents += tx.amount_cents;
            agency.cpc.last_recharge_at = Some(tx.created_at);
            agency.cpc.updated_at = tx.created_at;
            let new_balance = agency.cpc.balance_cents;
            for r in tx.refs.iter() {
                state.seen_refs.insert(r.to_string());
            }
            state.transactions.push(tx.clone());
            Ok(CreditOutcome::applied(new_balance))
        })
    }

    async fn try_debit(
        &self,
        agency_id: AgencyId,
        amount_cents: i64,
    ) -> Result<DebitOutcome, MarketError> {
        self.locked(|state| {
            let Some(agency) = state.agencies.get_mut(&agency_id) else {
                return Ok(DebitOutcome {
                    applied: false,
                    new_balance_cents: None,
                });
            };
            if agency.cpc.balance_cents < amount_cents {
                return Ok(DebitOutcome {
                    applied: false,
                    new_balance_cents: None,
                });
            }
            agency.cpc.balance_cents -= amount_cents;
            agency.cpc.total_spent_cents += amount_cents;
            agency.cpc.updated_at = Utc::now();
            Ok(DebitOutcome {
                applied: true,
                new_balance_cents: Some(agency.cpc.balance_cents),
            })
        })
    }

    async fn record_debit(&self, tx: &CpcTransaction) -> Result<(), MarketError> {
        self.locked(|state| {
            state.transactions.push(tx.clone());
            Ok(())
        })
    }

    async fn bump_click_counter(
        &self,
        agency_id: AgencyId,
        now: DateTime<Utc>,
    ) -> Result<u32, MarketError> {
        self.locked(|state| {
            let agency = state
                .agencies
                .get_mut(&agency_id)
                .ok_or_else(|| MarketError::AgencyNotFound(*agency_id.as_uuid()))?;
            let last = agency.cpc.updated_at;
            let same_month = last.year() == now.year() && last.month() == now.month();
            agency.cpc.clicks_this_month = if same_month {
                agency.cpc.clicks_this_month.saturating_add(1)
            } else {
                1
            };
            agency.cpc.updated_at = now;
            Ok(agency.cpc.clicks_this_month)
        })
    }

    async fn transactions_for(
        &self,
        agency_id: AgencyId,
    ) -> Result<Vec<CpcTransaction>, MarketError> {
        self.locked(|state| {
            let mut txs: Vec<CpcTransaction> = state
                .transactions
                .iter()
                .filter(|t| t.agency_id == agency_id)
                .cloned()
                .collect();
            txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(txs)
        })
    }
}

/// Shared transition logic; both backends implement these exact
/// semantics.
pub(crate) fn apply_subscription_update(agency: &mut Agency, update: SubscriptionUpdate) {
    match update {
        SubscriptionUpdate::Assign {
            pack,
            start_date,
            customer_ref,
            subscription_ref,
        } => {
            if agency.subscription.pack != pack {
                agency.subscription.history.push(PackChange {
                    from: agency.subscription.pack,
                    to: pack,
                    changed_at: Utc::now(),
                });
            }
            agency.subscription.pack = pack;
            agency.subscription.start_date = Some(start_date);
            agency.subscription.status = SubscriptionStatus::Active;
            if customer_ref.is_some() {
                agency.subscription.customer_ref = customer_ref;
            }
            if subscription_ref.is_some() {
                agency.subscription.subscription_ref = subscription_ref;
            }
        }
        SubscriptionUpdate::Cancel => {
            if agency.subscription.pack != PackTier::Free {
                agency.subscription.history.push(PackChange {
                    from: agency.subscription.pack,
                    to: PackTier::Free,
                    changed_at: Utc::now(),
                });
            }
            agency.subscription.pack = PackTier::Free;
            agency.subscription.start_date = None;
            agency.subscription.status = SubscriptionStatus::Canceled;
            agency.subscription.subscription_ref = None;
        }
        SubscriptionUpdate::Status(status) => {
            agency.subscription.status = status;
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::PaymentRefs;

    fn make_agency(balance: i64) -> Agency {
        let mut agency = Agency::new("Agence du Port", 50);
        agency.cpc.balance_cents = balance;
        agency
    }

    fn credit_tx(agency_id: AgencyId, amount: i64, intent: &str) -> CpcTransaction {
        CpcTransaction::credit(
            agency_id,
            amount,
            "eur",
            None,
            PaymentRefs {
                payment_intent_id: Some(intent.to_string()),
                ..PaymentRefs::default()
            },
            "recharge",
        )
    }

    #[tokio::test]
    async fn credit_is_idempotent_per_external_ref() {
        let store = MemoryStore::new();
        let agency = make_agency(0);
        let id = agency.id;
        let Ok(()) = store.insert_agency(&agency).await else {
            panic!("insert failed");
        };

        let first = store.record_credit(&credit_tx(id, 1000, "pi_1")).await;
        let Ok(first) = first else {
            panic!("credit failed");
        };
        assert!(first.applied);
        assert_eq!(first.new_balance_cents, Some(1000));

        // Re-delivery of the same payment notification.
        let second = store.record_credit(&credit_tx(id, 1000, "pi_1")).await;
        let Ok(second) = second else {
            panic!("credit failed");
        };
        assert!(!second.applied);
        assert_eq!(second.reason, Some("duplicate"));

        let Ok(Some(agency)) = store.get_agency(id).await else {
            panic!("agency missing");
        };
        assert_eq!(agency.cpc.balance_cents, 1000);

        let Ok(txs) = store.transactions_for(id).await else {
            panic!("transactions failed");
        };
        assert_eq!(txs.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_detected_across_different_ref_fields() {
        let store = MemoryStore::new();
        let agency = make_agency(0);
        let id = agency.id;
        let Ok(()) = store.insert_agency(&agency).await else {
            panic!("insert failed");
        };

        let primary = CpcTransaction::credit(
            id,
            1000,
            "eur",
            None,
            PaymentRefs {
                payment_intent_id: Some("pi_9".to_string()),
                checkout_session_id: Some("cs_9".to_string()),
                ..PaymentRefs::default()
            },
            "checkout",
        );
        let Ok(outcome) = store.record_credit(&primary).await else {
            panic!("credit failed");
        };
        assert!(outcome.applied);

        // Fallback event carries only the payment intent.
        let Ok(fallback) = store.record_credit(&credit_tx(id, 1000, "pi_9")).await else {
            panic!("credit failed");
        };
        assert!(!fallback.applied);
    }

    #[tokio::test]
    async fn debit_declines_without_going_negative() {
        let store = MemoryStore::new();
        let agency = make_agency(30);
        let id = agency.id;
        let Ok(()) = store.insert_agency(&agency).await else {
            panic!("insert failed");
        };

        let Ok(declined) = store.try_debit(id, 50).await else {
            panic!("debit failed");
        };
        assert!(!declined.applied);

        let Ok(Some(agency)) = store.get_agency(id).await else {
            panic!("agency missing");
        };
        assert_eq!(agency.cpc.balance_cents, 30);
    }

    #[tokio::test]
    async fn concurrent_debits_never_overdraw() {
        // Balance covers exactly N-1 debits.
        let n = 5;
        let amount = 40_i64;
        let store = Arc::new(MemoryStore::new());
        let agency = make_agency(amount * i64::from(n - 1));
        let id = agency.id;
        let Ok(()) = store.insert_agency(&agency).await else {
            panic!("insert failed");
        };

        let mut handles = Vec::new();
        for _ in 0..n {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(
                async move { store.try_debit(id, amount).await },
            ));
        }

        let mut applied = 0;
        let mut declined = 0;
        for handle in handles {
            let Ok(Ok(outcome)) = handle.await else {
                panic!("task failed");
            };
            if outcome.applied {
                applied += 1;
            } else {
                declined += 1;
            }
        }
        assert_eq!(applied, n - 1);
        assert_eq!(declined, 1);

        let Ok(Some(agency)) = store.get_agency(id).await else {
            panic!("agency missing");
        };
        assert_eq!(agency.cpc.balance_cents, 0);
    }

    #[tokio::test]
    async fn click_counter_resets_on_month_change() {
        let store = MemoryStore::new();
        let mut agency = make_agency(0);
        agency.cpc.clicks_this_month = 17;
        agency.cpc.updated_at = Utc::now() - chrono::Duration::days(40);
        let id = agency.id;
        let Ok(()) = store.insert_agency(&agency).await else {
            panic!("insert failed");
        };

        let Ok(count) = store.bump_click_counter(id, Utc::now()).await else {
            panic!("bump failed");
        };
        assert_eq!(count, 1);

        let Ok(count) = store.bump_click_counter(id, Utc::now()).await else {
            panic!("bump failed");
        };
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn subscription_history_appends_only_on_change() {
        let store = MemoryStore::new();
        let agency = make_agency(0);
        let id = agency.id;
        let Ok(()) = store.insert_agency(&agency).await else {
            panic!("insert failed");
        };

        let assign = || SubscriptionUpdate::Assign {
            pack: PackTier::Pro,
            start_date: Utc::now(),
            customer_ref: Some("cus_1".to_string()),
            subscription_ref: Some("sub_1".to_string()),
        };

        let Ok(()) = store.update_subscription(id, assign()).await else {
            panic!("update failed");
        };
        // Re-delivered event: same pack, no new history entry.
        let Ok(()) = store.update_subscription(id, assign()).await else {
            panic!("update failed");
        };

        let Ok(Some(agency)) = store.get_agency(id).await else {
            panic!("agency missing");
        };
        assert_eq!(agency.subscription.pack, PackTier::Pro);
        assert_eq!(agency.subscription.history.len(), 1);

        let Ok(()) = store
            .update_subscription(id, SubscriptionUpdate::Cancel)
            .await
        else {
            panic!("update failed");
        };
        let Ok(Some(agency)) = store.get_agency(id).await else {
            panic!("agency missing");
        };
        assert_eq!(agency.subscription.pack, PackTier::Free);
        assert_eq!(agency.subscription.history.len(), 2);
        assert!(agency.subscription.subscription_ref.is_none());
    }

    #[tokio::test]
    async fn search_caps_pool_sponsored_first() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for i in 0..5 {
            let mut listing = crate::domain::Listing {
                id: ListingId::new(),
                title: format!("listing {i}"),
                description: String::new(),
                property_type: crate::domain::PropertyType::House,
                status: ListingStatus::Active,
                price_cents: 100,
                surface_m2: 80.0,
                rooms: None,
                renovation_score: None,
                annual_energy_cost: None,
                dpe_class: None,
                ges_class: None,
                in_coproperty: false,
                city: "Nantes".to_string(),
                postal_code: "44000".to_string(),
                department: "44".to_string(),
                point: None,
                approximate_location: false,
                agency_id: None,
                published_at: now,
                is_sponsored: false,
                sponsored_at: None,
                sponsored_until: None,
                auto_boost_applied: false,
                auto_boost_recurrent: false,
            };
            if i == 4 {
                listing.is_sponsored = true;
                listing.sponsored_at = Some(now - chrono::Duration::hours(1));
                listing.sponsored_until = Some(now + chrono::Duration::hours(1));
            }
            let Ok(()) = store.insert_listing(&listing).await else {
                panic!("insert failed");
            };
        }

        let query = ListingQuery {
            limit: Some(2),
            ..ListingQuery::default()
        };
        let Ok(results) = store.search_listings(&query).await else {
            panic!("search failed");
        };
        assert_eq!(results.len(), 2);
        let Some(first) = results.first() else {
            panic!("expected results");
        };
        assert!(first.is_currently_sponsored(now));
    }
}
