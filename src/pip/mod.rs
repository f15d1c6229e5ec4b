//! Point-in-polygon postal zone lookup.
//!
//! Zones are loaded wholesale from a [`ZoneSource`] and indexed by admin code
//! and normalized municipality name; containment uses a bbox prefilter
//! followed by ray casting.

pub mod geometry;
mod index;
pub mod names;
mod source;

pub use index::ZoneIndex;
pub use names::{normalize_admin_code, normalize_place_name};
pub use source::{GeoJsonZoneSource, ZoneSource};
