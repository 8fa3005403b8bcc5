//! PostgreSQL implementation of the persistence layer.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use super::models::{AgencyRow, ListingRow, TransactionRow};
use super::{CreditOutcome, DebitOutcome, ListingQuery, MarketStore, SubscriptionUpdate};
use crate::domain::{
    Agency, AgencyId, CpcTransaction, Listing, ListingId, PackChange, PackTier,
    SubscriptionStatus,
};
use crate::error::MarketError;

const LISTING_COLUMNS: &str = "id, title, description, property_type, status, price_cents, \
     surface_m2, rooms, renovation_score, annual_energy_cost, dpe_class, ges_class, \
     in_coproperty, city, postal_code, department, lat, lon, approximate_location, agency_id, \
     published_at, is_sponsored, sponsored_at, sponsored_until, auto_boost_applied, \
     auto_boost_recurrent";

const AGENCY_COLUMNS: &str = "id, name, verified, suspended, pack, subscription_start, \
     subscription_status, customer_ref, subscription_ref, history, balance_cents, \
     total_spent_cents, cost_per_click_cents, clicks_this_month, last_recharge_at, \
     cpc_updated_at, created_at";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn persistence_err(e: impl std::fmt::Display) -> MarketError {
    MarketError::Persistence(e.to_string())
}

#[async_trait]
impl MarketStore for PostgresStore {
    async fn init(&self) -> Result<(), MarketError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(persistence_err)
    }

    async fn insert_listing(&self, listing: &Listing) -> Result<(), MarketError> {
        sqlx::query(
            "INSERT INTO listings (id, title, description, property_type, status, price_cents, \
             surface_m2, rooms, renovation_score, annual_energy_cost, dpe_class, ges_class, \
             in_coproperty, city, postal_code, department, lat, lon, approximate_location, \
             agency_id, published_at, is_sponsored, sponsored_at, sponsored_until, \
             auto_boost_applied, auto_boost_recurrent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)",
        )
        .bind(listing.id.as_uuid())
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.property_type.as_str())
        .bind(listing.status.as_str())
        .bind(listing.price_cents)
        .bind(listing.surface_m2)
        .bind(listing.rooms.map(i16::from))
        .bind(listing.renovation_score.map(i16::from))
        .bind(listing.annual_energy_cost)
        .bind(listing.dpe_class.map(|c| c.as_str()))
        .bind(listing.ges_class.map(|c| c.as_str()))
        .bind(listing.in_coproperty)
        .bind(&listing.city)
        .bind(&listing.postal_code)
        .bind(&listing.department)
        .bind(listing.point.map(|p| p.lat))
        .bind(listing.point.map(|p| p.lon))
        .bind(listing.approximate_location)
        .bind(listing.agency_id.map(|id| *id.as_uuid()))
        .bind(listing.published_at)
        .bind(listing.is_sponsored)
        .bind(listing.sponsored_at)
        .bind(listing.sponsored_until)
        .bind(listing.auto_boost_applied)
        .bind(listing.auto_boost_recurrent)
        .execute(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, MarketError> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;
        row.map(Listing::try_from).transpose()
    }

    async fn search_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, MarketError> {
        let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE status = 'active'"
        ));

        if let Some(text) = &query.text {
            let pattern = format!("%{}%", text.to_lowercase());
            qb.push(" AND (lower(title) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR lower(description) LIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        if let Some(city) = &query.city {
            qb.push(" AND lower(city) = lower(");
            qb.push_bind(city.clone());
            qb.push(")");
        }
        if let Some(postal) = &query.postal_code {
            qb.push(" AND postal_code = ");
            qb.push_bind(postal.clone());
        }
        if !query.property_types.is_empty() {
            let types: Vec<String> = query
                .property_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect();
            qb.push(" AND property_type = ANY(");
            qb.push_bind(types);
            qb.push(")");
        }
        if let Some(min) = query.price_min {
            qb.push(" AND price_cents >= ");
            qb.push_bind(min);
        }
        if let Some(max) = query.price_max {
            qb.push(" AND price_cents <= ");
            qb.push_bind(max);
        }
        if let Some(min) = query.surface_min {
            qb.push(" AND surface_m2 >= ");
            qb.push_bind(min);
        }
        if let Some(max) = query.surface_max {
            qb.push(" AND surface_m2 <= ");
            qb.push_bind(max);
        }
        if let Some(min) = query.rooms_min {
            qb.push(" AND rooms >= ");
            qb.push_bind(i16::from(min));
        }
        if let Some(min) = query.renovation_min {
            qb.push(" AND renovation_score >= ");
            qb.push_bind(i16::from(min));
        }
        if let Some(max) = query.energy_cost_max {
            qb.push(" AND (annual_energy_cost IS NULL OR annual_energy_cost <= ");
            qb.push_bind(max);
            qb.push(")");
        }
        if let Some(worst) = query.dpe_max {
            // Class letters sort alphabetically, A best to G worst.
            qb.push(" AND (dpe_class IS NULL OR dpe_class <= ");
            qb.push_bind(worst.as_str());
            qb.push(")");
        }
        if let Some(worst) = query.ges_max {
            qb.push(" AND (ges_class IS NULL OR ges_class <= ");
            qb.push_bind(worst.as_str());
            qb.push(")");
        }
        if let Some(copro) = query.in_coproperty {
            qb.push(" AND in_coproperty = ");
            qb.push_bind(copro);
        }
        if let Some(bbox) = &query.bbox {
            qb.push(" AND lon BETWEEN ");
            qb.push_bind(bbox.west);
            qb.push(" AND ");
            qb.push_bind(bbox.east);
            qb.push(" AND lat BETWEEN ");
            qb.push_bind(bbox.south);
            qb.push(" AND ");
            qb.push_bind(bbox.north);
        }

        // Sponsored-first so the pool cap never starves paid listings.
        // IS TRUE folds the NULL-window case to false.
        qb.push(
            " ORDER BY (is_sponsored AND sponsored_at <= now() AND sponsored_until >= now()) \
             IS TRUE DESC, published_at DESC",
        );
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = qb
            .build_query_as::<ListingRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(persistence_err)?;
        rows.into_iter().map(Listing::try_from).collect()
    }

    async fn count_active_listings(&self, agency_id: AgencyId) -> Result<u32, MarketError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM listings WHERE agency_id = $1 AND status = 'active'",
        )
        .bind(agency_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_agency(&self, agency: &Agency) -> Result<(), MarketError> {
        let history = serde_json::to_value(&agency.subscription.history)
            .map_err(persistence_err)?;
        let status = match agency.subscription.status {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        };
        sqlx::query(
            "INSERT INTO agencies (id, name, verified, suspended, pack, subscription_start, \
             subscription_status, customer_ref, subscription_ref, history, balance_cents, \
             total_spent_cents, cost_per_click_cents, clicks_this_month, last_recharge_at, \
             cpc_updated_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(agency.id.as_uuid())
        .bind(&agency.name)
        .bind(agency.verified)
        .bind(agency.suspended)
        .bind(agency.subscription.pack.as_str())
        .bind(agency.subscription.start_date)
        .bind(status)
        .bind(&agency.subscription.customer_ref)
        .bind(&agency.subscription.subscription_ref)
        .bind(history)
        .bind(agency.cpc.balance_cents)
        .bind(agency.cpc.total_spent_cents)
        .bind(agency.cpc.cost_per_click_cents)
        .bind(i32::try_from(agency.cpc.clicks_this_month).unwrap_or(i32::MAX))
        .bind(agency.cpc.last_recharge_at)
        .bind(agency.cpc.updated_at)
        .bind(agency.created_at)
        .execute(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn get_agency(&self, id: AgencyId) -> Result<Option<Agency>, MarketError> {
        let row = sqlx::query_as::<_, AgencyRow>(&format!(
            "SELECT {AGENCY_COLUMNS} FROM agencies WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;
        row.map(Agency::try_from).transpose()
    }

    async fn get_agencies(
        &self,
        ids: &[AgencyId],
    ) -> Result<HashMap<AgencyId, Agency>, MarketError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, AgencyRow>(&format!(
            "SELECT {AGENCY_COLUMNS} FROM agencies WHERE id = ANY($1)"
        ))
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_err)?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            let agency = Agency::try_from(row)?;
            map.insert(agency.id, agency);
        }
        Ok(map)
    }

    async fn find_agency_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<Agency>, MarketError> {
        let row = sqlx::query_as::<_, AgencyRow>(&format!(
            "SELECT {AGENCY_COLUMNS} FROM agencies WHERE subscription_ref = $1"
        ))
        .bind(subscription_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;
        row.map(Agency::try_from).transpose()
    }

    async fn update_subscription(
        &self,
        agency_id: AgencyId,
        update: SubscriptionUpdate,
    ) -> Result<(), MarketError> {
        let mut db_tx = self.pool.begin().await.map_err(persistence_err)?;

        let row = sqlx::query("SELECT pack, history FROM agencies WHERE id = $1 FOR UPDATE")
            .bind(agency_id.as_uuid())
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(persistence_err)?;
        let Some(row) = row else {
            return Err(MarketError::AgencyNotFound(*agency_id.as_uuid()));
        };
        let current_pack =
            PackTier::parse_or_free(&row.try_get::<String, _>("pack").map_err(persistence_err)?);
        let mut history: Vec<PackChange> = serde_json::from_value(
            row.try_get::<serde_json::Value, _>("history")
                .map_err(persistence_err)?,
        )
        .map_err(persistence_err)?;

        match update {
            SubscriptionUpdate::Assign {
                pack,
                start_date,
                customer_ref,
                subscription_ref,
            } => {
                if current_pack != pack {
                    history.push(PackChange {
                        from: current_pack,
                        to: pack,
                        changed_at: Utc::now(),
                    });
                }
                let history_json = serde_json::to_value(&history).map_err(persistence_err)?;
                sqlx::query(
                    "UPDATE agencies SET pack = $2, subscription_start = $3, \
                     subscription_status = 'active', \
                     customer_ref = COALESCE($4, customer_ref), \
                     subscription_ref = COALESCE($5, subscription_ref), \
                     history = $6 WHERE id = $1",
                )
                .bind(agency_id.as_uuid())
                .bind(pack.as_str())
                .bind(start_date)
                .bind(customer_ref)
                .bind(subscription_ref)
                .bind(history_json)
                .execute(&mut *db_tx)
                .await
                .map_err(persistence_err)?;
            }
            SubscriptionUpdate::Cancel => {
                if current_pack != PackTier::Free {
                    history.push(PackChange {
                        from: current_pack,
                        to: PackTier::Free,
                        changed_at: Utc::now(),
                    });
                }
                let history_json = serde_json::to_value(&history).map_err(persistence_err)?;
                sqlx::query(
                    "UPDATE agencies SET pack = 'free', subscription_start = NULL, \
                     subscription_status = 'canceled', subscription_ref = NULL, \
                     history = $2 WHERE id = $1",
                )
                .bind(agency_id.as_uuid())
                .bind(history_json)
                .execute(&mut *db_tx)
                .await
                .map_err(persistence_err)?;
            }
            SubscriptionUpdate::Status(status) => {
                let status = match status {
                    SubscriptionStatus::Active => "active",
                    SubscriptionStatus::PastDue => "past_due",
                    SubscriptionStatus::Canceled => "canceled",
                };
                sqlx::query("UPDATE agencies SET subscription_status = $2 WHERE id = $1")
                    .bind(agency_id.as_uuid())
                    .bind(status)
                    .execute(&mut *db_tx)
                    .await
                    .map_err(persistence_err)?;
            }
        }

        db_tx.commit().await.map_err(persistence_err)
    }

    async fn record_credit(&self, tx: &CpcTransaction) -> Result<CreditOutcome, MarketError> {
        let mut db_tx = self.pool.begin().await.map_err(persistence_err)?;

        // Application-level duplicate check across every ref column; the
        // partial unique indexes remain the structural backstop.
        let refs: Vec<String> = tx.refs.iter().map(str::to_string).collect();
        let existing: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM cpc_transactions WHERE payment_intent_id = ANY($1) \
             OR charge_id = ANY($1) OR checkout_session_id = ANY($1) LIMIT 1",
        )
        .bind(&refs)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(persistence_err)?;
        if existing.is_some() {
            return Ok(CreditOutcome::duplicate());
        }

        let inserted = sqlx::query(
            "INSERT INTO cpc_transactions (id, agency_id, kind, amount_cents, currency, \
             credits_added, description, payment_intent_id, charge_id, checkout_session_id, \
             created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT DO NOTHING",
        )
        .bind(tx.id)
        .bind(tx.agency_id.as_uuid())
        .bind(tx.kind.as_str())
        .bind(tx.amount_cents)
        .bind(&tx.currency)
        .bind(tx.credits_added)
        .bind(&tx.description)
        .bind(&tx.refs.payment_intent_id)
        .bind(&tx.refs.charge_id)
        .bind(&tx.refs.checkout_session_id)
        .bind(tx.created_at)
        .execute(&mut *db_tx)
        .await
        .map_err(persistence_err)?;
        if inserted.rows_affected() == 0 {
            // A concurrent delivery won the insert race.
            return Ok(CreditOutcome::duplicate());
        }

        let new_balance: Option<i64> = sqlx::query_scalar(
            "UPDATE agencies SET balance_cents = balance_cents + $2, last_recharge_at = $3, \
             cpc_updated_at = $3 WHERE id = $1 RETURNING balance_cents",
        )
        .bind(tx.agency_id.as_uuid())
        .bind(tx.amount_cents)
        .bind(tx.created_at)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(persistence_err)?;
        let Some(new_balance) = new_balance else {
            return Err(MarketError::AgencyNotFound(*tx.agency_id.as_uuid()));
        };

        db_tx.commit().await.map_err(persistence_err)?;
        Ok(CreditOutcome::applied(new_balance))
    }

    async fn try_debit(
        &self,
        agency_id: AgencyId,
        amount_cents: i64,
    ) -> Result<DebitOutcome, MarketError> {
        // Single conditional update: the balance predicate and the
        // decrement execute as one atomic statement.
        let new_balance: Option<i64> = sqlx::query_scalar(
            "UPDATE agencies SET balance_cents = balance_cents - $2, \
             total_spent_cents = total_spent_cents + $2, cpc_updated_at = now() \
             WHERE id = $1 AND balance_cents >= $2 RETURNING balance_cents",
        )
        .bind(agency_id.as_uuid())
        .bind(amount_cents)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence_err)?;

        Ok(match new_balance {
            Some(balance) => DebitOutcome {
                applied: true,
                new_balance_cents: Some(balance),
            },
            None => DebitOutcome {
                applied: false,
                new_balance_cents: None,
            },
        })
    }

    async fn record_debit(&self, tx: &CpcTransaction) -> Result<(), MarketError> {
        sqlx::query(
            "INSERT INTO cpc_transactions (id, agency_id, kind, amount_cents, currency, \
             credits_added, description, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(tx.id)
        .bind(tx.agency_id.as_uuid())
        .bind(tx.kind.as_str())
        .bind(tx.amount_cents)
        .bind(&tx.currency)
        .bind(tx.credits_added)
        .bind(&tx.description)
        .bind(tx.created_at)
        .execute(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn bump_click_counter(
        &self,
        agency_id: AgencyId,
        now: DateTime<Utc>,
    ) -> Result<u32, MarketError> {
        let count: i32 = sqlx::query_scalar(
            "UPDATE agencies SET clicks_this_month = CASE \
             WHEN date_trunc('month', cpc_updated_at) = date_trunc('month', $2::timestamptz) \
             THEN clicks_this_month + 1 ELSE 1 END, \
             cpc_updated_at = $2 WHERE id = $1 RETURNING clicks_this_month",
        )
        .bind(agency_id.as_uuid())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(u32::try_from(count).unwrap_or(0))
    }

    async fn transactions_for(
        &self,
        agency_id: AgencyId,
    ) -> Result<Vec<CpcTransaction>, MarketError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, agency_id, kind, amount_cents, currency, credits_added, description, \
             payment_intent_id, charge_id, checkout_session_id, created_at \
             FROM cpc_transactions WHERE agency_id = $1 ORDER BY created_at DESC",
        )
        .bind(agency_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(rows.into_iter().map(CpcTransaction::from).collect())
    }
}
