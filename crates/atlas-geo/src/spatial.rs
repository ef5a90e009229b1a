//! Bounding envelopes and the area-of-interest filter

use geo::algorithm::bounding_rect::BoundingRect;

use crate::models::{to_geo_geometry, Envelope, Geometry};

/// Bounding envelope of a geometry, None when it has no coordinates
pub fn envelope_of(geometry: &Geometry) -> Option<Envelope> {
    let rect = to_geo_geometry(geometry).bounding_rect()?;
    Some(Envelope::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
}

/// Fixed region features must fall in to be imported
///
/// An unset region accepts everything.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AreaOfInterest {
    envelope: Option<Envelope>,
}

impl AreaOfInterest {
    pub fn new(envelope: Envelope) -> Self {
        Self { envelope: Some(envelope) }
    }

    /// Region that filters nothing
    pub fn unbounded() -> Self {
        Self { envelope: None }
    }

    /// Widen the region to also cover `envelope`
    pub fn include(&mut self, envelope: Envelope) {
        self.envelope = Some(match self.envelope {
            Some(current) => current.union(&envelope),
            None => envelope,
        });
    }

    pub fn envelope(&self) -> Option<Envelope> {
        self.envelope
    }

    pub fn is_bounded(&self) -> bool {
        self.envelope.is_some()
    }

    /// Inclusive point test
    pub fn accepts_point(&self, lng: f64, lat: f64) -> bool {
        self.envelope.map(|e| e.contains_point(lng, lat)).unwrap_or(true)
    }

    /// Envelope intersection test
    pub fn accepts_envelope(&self, other: &Envelope) -> bool {
        self.envelope.map(|e| e.intersects(other)).unwrap_or(true)
    }

    /// Points use the point test, everything else its bounding envelope
    pub fn accepts(&self, geometry: &Geometry) -> bool {
        if !self.is_bounded() {
            return true;
        }
        match geometry {
            Geometry::Point { coordinates: [lng, lat] } => self.accepts_point(*lng, *lat),
            other => envelope_of(other).map(|e| self.accepts_envelope(&e)).unwrap_or(false),
        }
    }
}
