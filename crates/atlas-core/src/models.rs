pub mod category;
pub mod geometry;
pub mod record;

pub use category::Category;
pub use geometry::{Crs, Envelope, Geometry, GeometryType, ValidityMode, WGS84_EPSG};
pub use record::{AttributeMap, SourceFeature, StoreRecord, UpsertOutcome};
