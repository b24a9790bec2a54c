// src/polygon.rs

use serde::{Deserialize, Serialize};

use crate::error::CairnError;
use crate::geopoint::CairnGeoPoint;

/// Represents a closed polygon of geo points. A polygon needs at least three
/// vertices; the server closes the ring itself.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CairnPolygon {
    #[serde(rename = "__type")]
    type_field: String, // Should always be "Polygon"
    pub coordinates: Vec<CairnGeoPoint>,
}

impl CairnPolygon {
    /// Creates a new `CairnPolygon` from its vertices.
    ///
    /// # Errors
    /// Returns `CairnError::InvalidInput` if fewer than three points are
    /// given.
    pub fn new(coordinates: Vec<CairnGeoPoint>) -> Result<Self, CairnError> {
        if coordinates.len() < 3 {
            return Err(CairnError::InvalidInput(format!(
                "a polygon needs at least 3 points, got {}",
                coordinates.len()
            )));
        }
        Ok(CairnPolygon {
            type_field: "Polygon".to_string(),
            coordinates,
        })
    }

    /// The `[[latitude, longitude], ...]` pair list used inside `$polygon`
    /// constraints.
    pub(crate) fn coordinate_pairs(&self) -> Vec<[f64; 2]> {
        self.coordinates
            .iter()
            .map(CairnGeoPoint::coordinate_pair)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_requires_three_points() {
        let a = CairnGeoPoint::new(10.1, 20.1).unwrap();
        let b = CairnGeoPoint::new(20.1, 30.1).unwrap();
        assert!(CairnPolygon::new(vec![a.clone(), b.clone()]).is_err());

        let c = CairnGeoPoint::new(30.1, 40.1).unwrap();
        let polygon = CairnPolygon::new(vec![a, b, c]).unwrap();
        assert_eq!(
            polygon.coordinate_pairs(),
            vec![[10.1, 20.1], [20.1, 30.1], [30.1, 40.1]]
        );
    }
}
