use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Number, Value as JsonValue};

use crate::{
    error::{ConsensusError, Result},
    types::ClosedContour,
};

/// Closed contours of one slice, in pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourSet {
    pub name: String,
    pub contours: Vec<ClosedContour>,
    pub image_width: u32,
    pub image_height: u32,
}

fn float(value: f32) -> JsonValue {
    Number::from_f64(value as f64)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

impl ContourSet {
    pub fn new(name: impl Into<String>, contours: Vec<ClosedContour>, image_width: u32, image_height: u32) -> Self {
        Self {
            name: name.into(),
            contours,
            image_width,
            image_height,
        }
    }

    /// One polygon feature per contour, with `id`, `area` and `perimeter`
    /// properties. Rings are explicitly closed as GeoJSON requires.
    pub fn to_geojson(&self) -> FeatureCollection {
        let features = self
            .contours
            .iter()
            .enumerate()
            .filter(|(_, contour)| !contour.is_empty())
            .map(|(i, contour)| {
                let mut ring: Vec<Vec<f64>> = contour
                    .points
                    .iter()
                    .map(|&[x, y]| vec![x as f64, y as f64])
                    .collect();
                if let Some(first) = ring.first().cloned() {
                    ring.push(first);
                }

                let mut properties = Map::new();
                properties.insert("id".to_string(), JsonValue::Number(Number::from(i)));
                properties.insert("area".to_string(), float(contour.area()));
                properties.insert("perimeter".to_string(), float(contour.perimeter()));

                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
                    id: Some(geojson::feature::Id::Number(Number::from(i))),
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        let mut foreign_members = Map::new();
        foreign_members.insert("name".to_string(), JsonValue::String(self.name.clone()));
        foreign_members.insert("image_width".to_string(), JsonValue::Number(Number::from(self.image_width)));
        foreign_members.insert("image_height".to_string(), JsonValue::Number(Number::from(self.image_height)));
        foreign_members.insert("contour_count".to_string(), JsonValue::Number(Number::from(self.contours.len())));

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        }
    }

    pub fn to_geojson_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_geojson())?)
    }

    pub fn save_geojson(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }

    /// Parse a collection written by [`ContourSet::to_geojson_string`].
    pub fn from_geojson_string(geojson_str: &str) -> Result<Self> {
        let collection: FeatureCollection = geojson_str.parse()?;

        let foreign_members = collection.foreign_members.as_ref()
            .ok_or_else(|| ConsensusError::InvalidConfig("Missing metadata in GeoJSON".to_string()))?;
        let dimension = |key: &str| {
            foreign_members.get(key)
                .and_then(|v| v.as_u64())
                .map(|v| v as u32)
                .ok_or_else(|| ConsensusError::InvalidConfig(format!("Missing or invalid {key}")))
        };
        let image_width = dimension("image_width")?;
        let image_height = dimension("image_height")?;
        let name = foreign_members.get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let contours = collection
            .features
            .into_iter()
            .filter_map(|feature| match feature.geometry?.value {
                Value::Polygon(rings) => rings.into_iter().next(),
                _ => None,
            })
            .map(|mut ring| {
                // drop the explicit closing coordinate
                if ring.len() > 1 && ring.first() == ring.last() {
                    ring.pop();
                }
                ClosedContour::new(ring.iter().map(|c| [c[0] as f32, c[1] as f32]).collect())
            })
            .collect();

        Ok(Self {
            name,
            contours,
            image_width,
            image_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContourSet {
        ContourSet::new(
            "slice_007",
            vec![
                ClosedContour::new(vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]),
                ClosedContour::new(vec![[10.0, 10.0], [12.0, 10.0], [11.0, 12.0]]),
            ],
            32,
            24,
        )
    }

    #[test]
    fn test_features_carry_measurements() {
        let collection = sample().to_geojson();
        assert_eq!(collection.features.len(), 2);

        let properties = collection.features[0].properties.as_ref().expect("Should have properties");
        assert_eq!(properties["area"].as_f64(), Some(16.0));
        assert_eq!(properties["perimeter"].as_f64(), Some(16.0));

        let Some(Geometry { value: Value::Polygon(rings), .. }) = &collection.features[0].geometry else {
            panic!("Should be a polygon");
        };
        assert_eq!(rings[0].len(), 5);
        assert_eq!(rings[0].first(), rings[0].last());
    }

    #[test]
    fn test_string_round_trip_restores_contours() {
        let set = sample();
        let text = set.to_geojson_string().expect("Should serialize");
        let restored = ContourSet::from_geojson_string(&text).expect("Should parse");
        assert_eq!(restored, set);
    }

    #[test]
    fn test_missing_metadata_is_rejected() {
        let text = r#"{"type": "FeatureCollection", "features": []}"#;
        assert!(ContourSet::from_geojson_string(text).is_err());
    }
}
