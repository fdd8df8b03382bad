//! Geographic resolution — static locality dataset + deterministic coverage
//! resolver.
//!
//! The dataset is loaded once at startup and shared read-only for the process
//! lifetime. Resolution is a pure function of (base point, radius,
//! adjustments) over that snapshot: no I/O, no clock, no randomness.

pub mod dataset;
pub mod resolver;

pub use dataset::{GeoDataset, Locality};
pub use resolver::{Adjustments, BasePoint, CoverageArea, GeoResolver, RegionGroup};
