//! Submission service: authorization gate, pack quota enforcement, and
//! the auto-boost applier.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::domain::{
    AgencyId, EnergyClass, GeoPoint, Listing, ListingId, ListingStatus, PropertyType, pack,
};
use crate::error::MarketError;
use crate::persistence::MarketStore;

/// A new listing as submitted, before server-side stamping.
#[derive(Debug, Clone)]
pub struct ListingDraft {
    /// Ad title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Property category.
    pub property_type: PropertyType,
    /// Asking price in euro cents.
    pub price_cents: i64,
    /// Habitable surface in m².
    pub surface_m2: f64,
    /// Number of rooms.
    pub rooms: Option<u8>,
    /// Renovation score.
    pub renovation_score: Option<u8>,
    /// Annual energy cost in euros.
    pub annual_energy_cost: Option<i32>,
    /// DPE class.
    pub dpe_class: Option<EnergyClass>,
    /// GES class.
    pub ges_class: Option<EnergyClass>,
    /// Coproperty membership.
    pub in_coproperty: bool,
    /// City name.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// Department code.
    pub department: String,
    /// Geocoded point, when available.
    pub point: Option<GeoPoint>,
    /// Whether the point is only approximate.
    pub approximate_location: bool,
    /// Owning agency; `None` for platform-sourced listings.
    pub agency_id: Option<AgencyId>,
}

/// Creates listings under pack policy.
#[derive(Debug)]
pub struct SubmissionService {
    store: Arc<dyn MarketStore>,
}

impl SubmissionService {
    /// Creates a new `SubmissionService`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Submits a listing: authorization, quota, auto-boost, insert.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] for an empty title or
    /// non-positive price, [`MarketError::AgencyNotFound`] for an
    /// unknown agency, [`MarketError::Authorization`] for an
    /// unverified or suspended one, and [`MarketError::QuotaExceeded`]
    /// when the pack's active-listing limit is reached.
    pub async fn submit(&self, draft: ListingDraft) -> Result<Listing, MarketError> {
        if draft.title.trim().is_empty() {
            return Err(MarketError::Validation("title must not be empty".to_string()));
        }
        if draft.price_cents <= 0 {
            return Err(MarketError::Validation(format!(
                "price must be positive, got {}",
                draft.price_cents
            )));
        }

        let pack_config = match draft.agency_id {
            Some(agency_id) => {
                let agency = self
                    .store
                    .get_agency(agency_id)
                    .await?
                    .ok_or_else(|| MarketError::AgencyNotFound(*agency_id.as_uuid()))?;
                if !agency.can_submit() {
                    let reason = if agency.suspended {
                        "agency is suspended"
                    } else {
                        "agency is not verified"
                    };
                    return Err(MarketError::Authorization(reason.to_string()));
                }

                let tier = agency.subscription.pack;
                let active = self.store.count_active_listings(agency_id).await?;
                if pack::remaining_listing_quota(tier, active) == Some(0) {
                    let config = pack::config_for(tier);
                    #[allow(clippy::cast_sign_loss)]
                    let max = config.max_active_listings.max(0) as u32;
                    return Err(MarketError::QuotaExceeded {
                        current: active,
                        max,
                        suggested_tier: tier.next_tier(),
                    });
                }
                Some(pack::config_for(tier))
            }
            None => None,
        };

        let now = Utc::now();
        let mut listing = Listing {
            id: ListingId::new(),
            title: draft.title,
            description: draft.description,
            property_type: draft.property_type,
            status: ListingStatus::Active,
            price_cents: draft.price_cents,
            surface_m2: draft.surface_m2,
            rooms: draft.rooms,
            renovation_score: draft.renovation_score,
            annual_energy_cost: draft.annual_energy_cost,
            dpe_class: draft.dpe_class,
            ges_class: draft.ges_class,
            in_coproperty: draft.in_coproperty,
            city: draft.city,
            postal_code: draft.postal_code,
            department: draft.department,
            point: draft.point,
            approximate_location: draft.approximate_location,
            agency_id: draft.agency_id,
            published_at: now,
            is_sponsored: false,
            sponsored_at: None,
            sponsored_until: None,
            auto_boost_applied: false,
            auto_boost_recurrent: false,
        };

        // Auto-boost applier: qualifying packs grant new listings a
        // time-boxed sponsorship window at no CPC cost.
        if let Some(config) = pack_config
            && config.auto_boost
        {
            listing.is_sponsored = true;
            listing.sponsored_at = Some(now);
            listing.sponsored_until = Some(now + Duration::hours(config.auto_boost_duration_hours));
            listing.auto_boost_applied = true;
            listing.auto_boost_recurrent = config.auto_boost_recurrent;
            tracing::info!(
                listing_id = %listing.id,
                agency_id = ?draft.agency_id,
                duration_hours = config.auto_boost_duration_hours,
                "auto-boost applied"
            );
        }

        self.store.insert_listing(&listing).await?;
        tracing::info!(listing_id = %listing.id, city = %listing.city, "listing submitted");
        Ok(listing)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Agency, PackTier};
    use crate::persistence::memory::MemoryStore;

    fn draft(agency_id: Option<AgencyId>) -> ListingDraft {
        ListingDraft {
            title: "T2 refait à neuf".to_string(),
            description: "Deuxième étage, ascenseur".to_string(),
            property_type: PropertyType::Apartment,
            price_cents: 18_500_000,
            surface_m2: 45.0,
            rooms: Some(2),
            renovation_score: Some(9),
            annual_energy_cost: Some(700),
            dpe_class: Some(EnergyClass::C),
            ges_class: None,
            in_coproperty: true,
            city: "Bordeaux".to_string(),
            postal_code: "33000".to_string(),
            department: "33".to_string(),
            point: None,
            approximate_location: false,
            agency_id,
        }
    }

    async fn seed_agency(store: &MemoryStore, pack: PackTier) -> AgencyId {
        let mut agency = Agency::new("Agence des Quais", 50);
        agency.subscription.pack = pack;
        let id = agency.id;
        let Ok(()) = store.insert_agency(&agency).await else {
            panic!("insert failed");
        };
        id
    }

    #[tokio::test]
    async fn premium_submission_gets_48h_boost() {
        let store = Arc::new(MemoryStore::new());
        let agency_id = seed_agency(&store, PackTier::Premium).await;
        let service = SubmissionService::new(Arc::clone(&store) as Arc<dyn MarketStore>);

        let Ok(listing) = service.submit(draft(Some(agency_id))).await else {
            panic!("submit failed");
        };
        assert!(listing.is_sponsored);
        assert!(listing.auto_boost_applied);
        assert!(listing.auto_boost_recurrent);
        let (Some(start), Some(end)) = (listing.sponsored_at, listing.sponsored_until) else {
            panic!("expected a sponsorship window");
        };
        assert_eq!(end - start, Duration::hours(48));
    }

    #[tokio::test]
    async fn non_boosting_pack_leaves_listing_unsponsored() {
        let store = Arc::new(MemoryStore::new());
        let agency_id = seed_agency(&store, PackTier::Pro).await;
        let service = SubmissionService::new(Arc::clone(&store) as Arc<dyn MarketStore>);

        let Ok(listing) = service.submit(draft(Some(agency_id))).await else {
            panic!("submit failed");
        };
        assert!(!listing.is_sponsored);
        assert!(!listing.auto_boost_applied);
        assert!(listing.sponsored_at.is_none());
    }

    #[tokio::test]
    async fn quota_boundary_is_exact() {
        let store = Arc::new(MemoryStore::new());
        let agency_id = seed_agency(&store, PackTier::Free).await; // max 3
        let service = SubmissionService::new(Arc::clone(&store) as Arc<dyn MarketStore>);

        for _ in 0..3 {
            let Ok(_) = service.submit(draft(Some(agency_id))).await else {
                panic!("submit below the limit must succeed");
            };
        }

        let result = service.submit(draft(Some(agency_id))).await;
        let Err(MarketError::QuotaExceeded {
            current,
            max,
            suggested_tier,
        }) = result
        else {
            panic!("expected QuotaExceeded");
        };
        assert_eq!(current, 3);
        assert_eq!(max, 3);
        assert_eq!(suggested_tier, Some(PackTier::Starter));
    }

    #[tokio::test]
    async fn unlimited_pack_never_hits_quota() {
        let store = Arc::new(MemoryStore::new());
        let agency_id = seed_agency(&store, PackTier::Premium).await;
        let service = SubmissionService::new(Arc::clone(&store) as Arc<dyn MarketStore>);

        for _ in 0..10 {
            let Ok(_) = service.submit(draft(Some(agency_id))).await else {
                panic!("unlimited pack must accept submissions");
            };
        }
    }

    #[tokio::test]
    async fn suspended_agency_is_rejected_with_reason() {
        let store = Arc::new(MemoryStore::new());
        let mut agency = Agency::new("Agence Fermée", 50);
        agency.suspended = true;
        let id = agency.id;
        let Ok(()) = store.insert_agency(&agency).await else {
            panic!("insert failed");
        };
        let service = SubmissionService::new(Arc::clone(&store) as Arc<dyn MarketStore>);

        let result = service.submit(draft(Some(id))).await;
        let Err(MarketError::Authorization(reason)) = result else {
            panic!("expected Authorization error");
        };
        assert!(reason.contains("suspended"));
    }

    #[tokio::test]
    async fn platform_sourced_listing_skips_policy() {
        let store = Arc::new(MemoryStore::new());
        let service = SubmissionService::new(Arc::clone(&store) as Arc<dyn MarketStore>);

        let Ok(listing) = service.submit(draft(None)).await else {
            panic!("submit failed");
        };
        assert!(listing.agency_id.is_none());
        assert!(!listing.is_sponsored);
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = SubmissionService::new(Arc::clone(&store) as Arc<dyn MarketStore>);
        let mut bad = draft(None);
        bad.title = "  ".to_string();
        let result = service.submit(bad).await;
        assert!(matches!(result, Err(MarketError::Validation(_))));
    }
}
