// src/geopoint.rs

use serde::{Deserialize, Serialize};

use crate::error::CairnError;

/// Earth radius in miles, used to convert mile distances to radians for
/// sphere queries.
pub(crate) const EARTH_RADIUS_MILES: f64 = 3958.8;
/// Earth radius in kilometers.
pub(crate) const EARTH_RADIUS_KILOMETERS: f64 = 6371.0;

/// Represents a geographical point.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CairnGeoPoint {
    #[serde(rename = "__type")]
    type_field: String, // Should always be "GeoPoint"
    pub latitude: f64,
    pub longitude: f64,
}

impl CairnGeoPoint {
    /// Creates a new `CairnGeoPoint`.
    ///
    /// # Errors
    /// Returns `CairnError::InvalidInput` if latitude is not between -90 and
    /// 90, or longitude is not between -180 and 180.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CairnError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CairnError::InvalidInput(format!(
                "latitude {} must be between -90 and 90 degrees",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CairnError::InvalidInput(format!(
                "longitude {} must be between -180 and 180 degrees",
                longitude
            )));
        }
        Ok(CairnGeoPoint {
            type_field: "GeoPoint".to_string(),
            latitude,
            longitude,
        })
    }

    /// The `[latitude, longitude]` pair used inside polygon constraints.
    pub(crate) fn coordinate_pair(&self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

impl Default for CairnGeoPoint {
    fn default() -> Self {
        CairnGeoPoint {
            type_field: "GeoPoint".to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geopoint_wire_shape() {
        let point = CairnGeoPoint::new(10.0, 20.0).unwrap();
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"__type": "GeoPoint", "latitude": 10.0, "longitude": 20.0})
        );
    }

    #[test]
    fn test_geopoint_rejects_out_of_range() {
        assert!(CairnGeoPoint::new(90.1, 0.0).is_err());
        assert!(CairnGeoPoint::new(-90.1, 0.0).is_err());
        assert!(CairnGeoPoint::new(0.0, 180.1).is_err());
        assert!(CairnGeoPoint::new(0.0, -180.1).is_err());
        assert!(CairnGeoPoint::new(90.0, -180.0).is_ok());
    }
}
