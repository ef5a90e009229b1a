//! Atlas Geo - Geometry normalization, validation, filtering and simplification
//!
//! Each stage of the per-feature pipeline lives in its own module:
//! [`transform`] brings coordinates into WGS 84, [`validation`] checks their
//! structure, [`spatial`] tests them against the area of interest and
//! [`simplify`] thins out over-complex shapes.

pub mod models;
pub mod simplify;
pub mod spatial;
pub mod transform;
pub mod validation;

pub use simplify::{simplify, simplify_if_complex};
pub use spatial::{envelope_of, AreaOfInterest};
pub use transform::{is_wgs84_pair, CoordinateNormalizer, Normalized};
pub use validation::{is_valid_geometry, parse_geometry, validate_geometry};
