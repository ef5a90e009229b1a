//! Per-category attribute mapping
//!
//! Each mapper turns a source feature's raw properties into the flat attribute
//! set stored for its category. Field names follow the published source files;
//! several aliases are accepted where sources disagree.

use atlas_core::error::{AtlasError, Result};
use atlas_core::formats::csv::parse_decimal;
use atlas_core::models::{AttributeMap, SourceFeature};
use serde_json::Value;

/// Annual CO2 emissions above which an emission source counts as major, in tonnes
pub const MAJOR_EMITTER_THRESHOLD_T: f64 = 100_000.0;

/// Fill colours for the political-affinity choropleth, one per 10 % band
pub const AFFINITY_PALETTE: [&str; 10] = [
    "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6",
    "#4292c6", "#2171b5", "#08519c", "#08306b", "#041f4a",
];

/// Party share fields summed into the affinity percentage
pub const AFFINITY_FIELDS: [&str; 3] = ["OEVP_perc", "FPOE_perc", "SPO_perc"];

/// What a mapper extracts from one feature
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedAttributes {
    pub natural_key: Option<String>,
    pub name: Option<String>,
    pub attributes: AttributeMap,
}

pub type AttributeMapper = fn(&SourceFeature) -> Result<MappedAttributes>;

/// First non-blank string (or number rendered as string) among `keys`
pub fn text(properties: &AttributeMap, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match properties.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First numeric value among `keys`; numeric strings (decimal comma allowed) count
///
/// A present but non-numeric value is an error rather than a silent miss.
pub fn number(feature: &SourceFeature, keys: &[&str]) -> Result<Option<f64>> {
    for key in keys {
        match feature.properties.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => return Ok(n.as_f64()),
            Some(Value::String(s)) if s.trim().is_empty() => continue,
            Some(Value::String(s)) => {
                return parse_decimal(s).map(Some).ok_or_else(|| invalid(feature, key, format!("'{}' is not a number", s)))
            }
            Some(other) => return Err(invalid(feature, key, format!("unexpected value {}", other))),
        }
    }
    Ok(None)
}

fn invalid(feature: &SourceFeature, field: &str, reason: String) -> AtlasError {
    AtlasError::InvalidAttribute {
        feature_id: feature.id.clone(),
        field: field.to_string(),
        reason,
    }
}

fn put(attributes: &mut AttributeMap, key: &str, value: impl Into<Value>) {
    attributes.insert(key.to_string(), value.into());
}

/// Fill colour for an affinity percentage; values outside [0, 100] clamp to the end bands
pub fn affinity_color(percent: f64) -> Option<&'static str> {
    if !percent.is_finite() {
        return None;
    }
    let band = (percent / 10.0).floor().clamp(0.0, 9.0) as usize;
    Some(AFFINITY_PALETTE[band])
}

pub fn map_boundary(feature: &SourceFeature) -> Result<MappedAttributes> {
    let name = text(&feature.properties, &["name", "NAME", "BL", "bundesland"]);
    let mut attributes = AttributeMap::new();
    put(&mut attributes, "name", name.clone());
    if let Some(code) = text(&feature.properties, &["BL_KZ", "iso", "ISO"]) {
        put(&mut attributes, "code", code);
    }
    Ok(MappedAttributes { natural_key: None, name, attributes })
}

/// Municipalities, keyed by their official code (GKZ)
pub fn map_district(feature: &SourceFeature) -> Result<MappedAttributes> {
    let key = text(&feature.properties, &["GKZ", "gkz", "g_id"])
        .ok_or_else(|| invalid(feature, "GKZ", "missing district code".to_string()))?;
    let name = text(&feature.properties, &["PG", "GEMNAM", "name", "NAME"]);

    let mut attributes = AttributeMap::new();
    put(&mut attributes, "gkz", key.clone());
    put(&mut attributes, "name", name.clone());

    let mut shares = Vec::with_capacity(AFFINITY_FIELDS.len());
    for field in AFFINITY_FIELDS.iter().chain(["GRUENE_perc", "KPOE_perc"].iter()) {
        let value = number(feature, &[field])?;
        put(&mut attributes, &field.to_lowercase(), value);
        if AFFINITY_FIELDS.contains(field) {
            shares.push(value);
        }
    }

    // Only meaningful when all three shares are present
    let affinity: Option<f64> = shares.into_iter().sum();
    put(&mut attributes, "affinity_percent", affinity);
    put(&mut attributes, "fill_color", affinity.and_then(affinity_color));

    Ok(MappedAttributes { natural_key: Some(key), name, attributes })
}

pub fn map_emission_source(feature: &SourceFeature) -> Result<MappedAttributes> {
    let name = text(&feature.properties, &["Name", "name", "Anlage", "facility"]);
    let co2 = number(feature, &["CO2_t", "co2_emissions", "Emissionen", "CO2"])?;

    let mut attributes = AttributeMap::new();
    put(&mut attributes, "name", name.clone());
    put(&mut attributes, "operator", text(&feature.properties, &["Betreiber", "operator"]));
    put(&mut attributes, "sector", text(&feature.properties, &["Sektor", "sector", "Branche"]));
    put(&mut attributes, "co2_emissions_t", co2);
    put(&mut attributes, "is_major", co2.map(|t| t > MAJOR_EMITTER_THRESHOLD_T).unwrap_or(false));

    Ok(MappedAttributes { natural_key: None, name, attributes })
}

pub fn map_landfill(feature: &SourceFeature) -> Result<MappedAttributes> {
    let name = text(&feature.properties, &["Name", "name", "Bezeichnung"]);

    let mut attributes = AttributeMap::new();
    put(&mut attributes, "name", name.clone());
    put(&mut attributes, "landfill_type", text(&feature.properties, &["Typ", "type", "Deponietyp"]));
    put(&mut attributes, "status", text(&feature.properties, &["Status", "status"]));
    put(&mut attributes, "capacity_m3", number(feature, &["Volumen_m3", "capacity_m3"])?);

    Ok(MappedAttributes { natural_key: None, name, attributes })
}

pub fn map_pipeline(feature: &SourceFeature) -> Result<MappedAttributes> {
    let name = text(&feature.properties, &["name", "NAME", "Leitung"]);

    let mut attributes = AttributeMap::new();
    put(&mut attributes, "name", name.clone());
    put(&mut attributes, "operator", text(&feature.properties, &["operator", "Betreiber"]));
    put(&mut attributes, "diameter_mm", number(feature, &["DN", "diameter_mm"])?);
    put(&mut attributes, "pressure_bar", number(feature, &["PN", "pressure_bar"])?);

    Ok(MappedAttributes { natural_key: None, name, attributes })
}

/// Shared by groundwater protection, conservation and settlement areas
pub fn map_area(feature: &SourceFeature) -> Result<MappedAttributes> {
    let name = text(&feature.properties, &["NAME", "name", "Bezeichnung", "SITENAME"]);

    let mut attributes = AttributeMap::new();
    put(&mut attributes, "name", name.clone());
    put(&mut attributes, "designation", text(&feature.properties, &["TYP", "type", "SITETYPE", "Kategorie"]));
    put(&mut attributes, "area_ha", number(feature, &["FLAECHE_HA", "area_ha", "AREA_HA"])?);

    Ok(MappedAttributes { natural_key: None, name, attributes })
}

pub fn map_transport_line(feature: &SourceFeature) -> Result<MappedAttributes> {
    let name = text(&feature.properties, &["name", "NAME", "Strecke"]);

    let mut attributes = AttributeMap::new();
    put(&mut attributes, "name", name.clone());
    put(&mut attributes, "kind", text(&feature.properties, &["kind", "type", "fclass", "Art"]));
    put(&mut attributes, "reference", text(&feature.properties, &["ref", "REF", "Nummer"]));

    Ok(MappedAttributes { natural_key: None, name, attributes })
}
