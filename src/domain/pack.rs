//! Pack policy: the static subscription-tier configuration table.
//!
//! A pack grants an agency a display priority, an active-listing quota,
//! CPC pricing terms, and a set of visible features. The table is pure
//! code/configuration — no I/O, and no failure mode beyond an unknown
//! tier, which resolves to the free tier so callers are never blocked
//! by a missing or invalid value.

use serde::{Deserialize, Serialize};

/// Subscription tier names, ordered by increasing display priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackTier {
    /// Free tier: entry level, no paid visibility features.
    Free,
    /// Starter tier: small quota bump and a CPC discount.
    Starter,
    /// Pro tier: large quota, map highlight, bigger discount.
    Pro,
    /// Premium tier: unlimited listings, auto-boost, best CPC terms.
    Premium,
}

impl PackTier {
    /// Parses a stored tier string, defaulting to [`PackTier::Free`]
    /// for unknown or missing values.
    #[must_use]
    pub fn parse_or_free(value: &str) -> Self {
        match value {
            "starter" => Self::Starter,
            "pro" => Self::Pro,
            "premium" => Self::Premium,
            _ => Self::Free,
        }
    }

    /// Stable string form used in storage and API payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Premium => "premium",
        }
    }

    /// The next tier up, or `None` for the top tier. Used to suggest
    /// an upgrade in quota rejections.
    #[must_use]
    pub const fn next_tier(&self) -> Option<Self> {
        match self {
            Self::Free => Some(Self::Starter),
            Self::Starter => Some(Self::Pro),
            Self::Pro => Some(Self::Premium),
            Self::Premium => None,
        }
    }
}

impl std::fmt::Display for PackTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which analytics panels a pack exposes to the agency.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsVisibility {
    /// Listing view counts.
    pub views: bool,
    /// Sponsored click counts and spend.
    pub clicks: bool,
    /// Contact/conversion funnel.
    pub conversions: bool,
}

/// Full configuration record for one tier.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PackConfig {
    /// The tier this record describes.
    pub tier: PackTier,
    /// Maximum simultaneously active listings; `-1` means unlimited.
    pub max_active_listings: i32,
    /// Display priority added to the ranking score (0–3, monotone).
    pub display_priority: u8,
    /// Whether the agency's markers are highlighted on the map.
    pub map_highlight: bool,
    /// Whether new listings receive an automatic sponsorship window.
    pub auto_boost: bool,
    /// Auto-boost window length in hours (meaningful when `auto_boost`).
    pub auto_boost_duration_hours: i64,
    /// Whether the boost re-applies on every new submission.
    pub auto_boost_recurrent: bool,
    /// Percentage discount on the base cost-per-click.
    pub cpc_discount_pct: u8,
    /// Maximum purchasable sponsorship window in days.
    pub cpc_max_duration_days: u16,
    /// Analytics visibility matrix.
    pub stats: StatsVisibility,
}

/// The static tier table, lowest tier first.
const PACKS: [PackConfig; 4] = [
    PackConfig {
        tier: PackTier::Free,
        max_active_listings: 3,
        display_priority: 0,
        map_highlight: false,
        auto_boost: false,
        auto_boost_duration_hours: 0,
        auto_boost_recurrent: false,
        cpc_discount_pct: 0,
        cpc_max_duration_days: 30,
        stats: StatsVisibility {
            views: true,
            clicks: false,
            conversions: false,
        },
    },
    PackConfig {
        tier: PackTier::Starter,
        max_active_listings: 15,
        display_priority: 1,
        map_highlight: false,
        auto_boost: false,
        auto_boost_duration_hours: 0,
        auto_boost_recurrent: false,
        cpc_discount_pct: 5,
        cpc_max_duration_days: 60,
        stats: StatsVisibility {
            views: true,
            clicks: true,
            conversions: false,
        },
    },
    PackConfig {
        tier: PackTier::Pro,
        max_active_listings: 50,
        display_priority: 2,
        map_highlight: true,
        auto_boost: false,
        auto_boost_duration_hours: 0,
        auto_boost_recurrent: false,
        cpc_discount_pct: 10,
        cpc_max_duration_days: 90,
        stats: StatsVisibility {
            views: true,
            clicks: true,
            conversions: true,
        },
    },
    PackConfig {
        tier: PackTier::Premium,
        max_active_listings: -1,
        display_priority: 3,
        map_highlight: true,
        auto_boost: true,
        auto_boost_duration_hours: 48,
        auto_boost_recurrent: true,
        cpc_discount_pct: 20,
        cpc_max_duration_days: 90,
        stats: StatsVisibility {
            views: true,
            clicks: true,
            conversions: true,
        },
    },
];

/// Returns the configuration record for a tier.
#[must_use]
pub const fn config_for(tier: PackTier) -> &'static PackConfig {
    match tier {
        PackTier::Free => &PACKS[0],
        PackTier::Starter => &PACKS[1],
        PackTier::Pro => &PACKS[2],
        PackTier::Premium => &PACKS[3],
    }
}

/// Returns the full tier table, lowest tier first.
#[must_use]
pub const fn all_packs() -> &'static [PackConfig; 4] {
    &PACKS
}

/// Applies the tier's CPC discount to a base price in cents.
///
/// Integer arithmetic, rounded down — a 20% discount on 50 cents
/// yields 40 cents.
#[must_use]
pub fn effective_cpc_price(tier: PackTier, base_price_cents: i64) -> i64 {
    let discount = i64::from(config_for(tier).cpc_discount_pct);
    base_price_cents * (100 - discount) / 100
}

/// Remaining listing quota for a tier given the current active count.
///
/// Returns `None` when the tier is unlimited, otherwise
/// `max(0, max_active_listings - active_count)`.
#[must_use]
pub fn remaining_listing_quota(tier: PackTier, active_count: u32) -> Option<u32> {
    let max = config_for(tier).max_active_listings;
    if max < 0 {
        return None;
    }
    #[allow(clippy::cast_sign_loss)]
    let max = max as u32;
    Some(max.saturating_sub(active_count))
}
