//! Cartero - postal code triangulation and batch geocoding for Colombian addresses
//!
//! This library provides the resolution engine used by the `resolve` binary:
//! zone indexing and point-in-polygon matching, address normalization, a
//! multi-provider geocoding resolver with a two-tier cache, and a quota-aware
//! batch processor.

pub mod batch;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod geocoder;
pub mod models;
pub mod municipal;
pub mod normalize;
pub mod pip;
pub mod triangulate;

pub use batch::{BatchProcessor, BatchReport, BatchSettings, NoProgress, ProgressSink};
pub use config::Config;
pub use engine::Engine;
pub use error::{ProviderError, ResolveError};
pub use models::{AddressRecord, PostalZone, ResolutionResult, Sentinel};
