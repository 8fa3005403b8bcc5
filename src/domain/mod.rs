//! Domain layer: entities, pack policy, and the pure ranking and
//! clustering algorithms.
//!
//! Everything here is side-effect free. Services wire these types to
//! the persistence layer; nothing in this module performs I/O.

pub mod agency;
pub mod clustering;
pub mod geo;
pub mod ids;
pub mod listing;
pub mod pack;
pub mod ranking;
pub mod transaction;

pub use agency::{Agency, CpcAccount, PackChange, Subscription, SubscriptionStatus};
pub use geo::{BoundingBox, GeoPoint};
pub use ids::{AgencyId, ListingId};
pub use listing::{EnergyClass, Listing, ListingStatus, PropertyType};
pub use pack::{PackConfig, PackTier};
pub use ranking::{RankedListing, SortKey, SortOrder};
pub use transaction::{CpcTransaction, PaymentRefs, TransactionKind};
