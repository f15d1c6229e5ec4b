//! Core data models for postal code triangulation.

pub mod municipal;
pub mod record;
pub mod zone;

pub use municipal::{AreaType, MunicipalIndexEntry, PostalCodeEntry};
pub use record::{AddressRecord, Assignment, ResolutionResult, ResolvedBy, Sentinel};
pub use zone::{GeoBbox, GeoPoint, PostalZone};
