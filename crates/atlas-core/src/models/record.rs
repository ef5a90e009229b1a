use serde::{Deserialize, Serialize};

use super::category::Category;
use super::geometry::{Geometry, WGS84_EPSG};

/// Open attribute bag: ordered string keys, scalar-or-null JSON values
pub type AttributeMap = serde_json::Map<String, serde_json::Value>;

/// Feature read from a source file, before any normalization
#[derive(Debug, Clone, Default)]
pub struct SourceFeature {
    /// Feature identifier (record number when the source has none)
    pub id: String,

    /// Geometry as read (GeoJSON-like structure), None for tabular rows and null shapes
    pub geometry: Option<serde_json::Value>,

    /// Source row / feature properties
    pub properties: AttributeMap,
}

/// Record handed to the store for one imported feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub category: Category,

    /// Stable natural identifier; keyed records upsert, unkeyed ones insert
    pub natural_key: Option<String>,

    pub name: Option<String>,

    /// Flat scalar attributes per the category schema
    pub attributes: AttributeMap,

    /// Normalized geometry, always in WGS 84
    pub geometry: Geometry,

    /// Original source properties, kept verbatim for audit
    pub raw: AttributeMap,
}

impl StoreRecord {
    pub fn srid(&self) -> u32 {
        WGS84_EPSG
    }
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}
