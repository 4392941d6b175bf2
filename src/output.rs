use anyhow::Result;
use geojson::{Feature, FeatureCollection, GeoJson};

use crate::block::Block;
use crate::lot::Lot;
use crate::strip::Strip;
use crate::{BlockLayout, StreetPlan};

fn feature_from(value: impl Into<geojson::Value>) -> Feature {
    Feature::from(geojson::Geometry::new(value.into()))
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

impl StreetPlan {
    /// One `LineString` feature per unique edge pair, tagged with its street and color.
    pub fn street_edge_features(&self) -> FeatureCollection {
        let mut features = Vec::new();
        for street in self.streets.values() {
            for edge in street.physical_edges(&self.graph) {
                let (a, b) = self.graph.edge_points(edge);
                let line = geo::LineString::new(vec![a, b]);
                let mut f = feature_from(&line);
                f.set_property("logicalStreetId", street.id.as_key());
                f.set_property("color", street.color.to_hex());
                features.push(f);
            }
        }
        collection(features)
    }

    pub fn block_features(&self, blocks: &[Block]) -> FeatureCollection {
        let mut features = Vec::new();
        for block in blocks {
            let mut f = feature_from(&block.polygon);
            f.set_property("type", "block");
            f.set_property("maxLotDepth", block.max_lot_depth);
            f.set_property(
                "logicalStreetIds",
                block
                    .streets
                    .iter()
                    .map(|s| s.as_key())
                    .collect::<Vec<_>>(),
            );
            features.push(f);
        }
        collection(features)
    }

    pub fn strip_features(&self, strips: &[Strip]) -> FeatureCollection {
        let mut features = Vec::new();
        for strip in strips {
            let mut f = feature_from(&strip.polygon);
            f.set_property("type", "strip");
            f.set_property("logicalStreetId", strip.street.as_key());
            features.push(f);
        }
        collection(features)
    }

    pub fn lot_features(&self, lots: &[Lot]) -> FeatureCollection {
        let mut features = Vec::new();
        for lot in lots {
            let mut f = feature_from(&lot.polygon);
            f.set_property("type", "lot");
            f.set_property("id", lot.id.clone());
            f.set_property("color", lot.color.to_hex());
            features.push(f);
        }
        collection(features)
    }

    /// Every feature of a generated layout in one collection: blocks, strips, then lots.
    pub fn layout_features(&self, layouts: &[BlockLayout]) -> FeatureCollection {
        let mut features = Vec::new();
        for layout in layouts {
            features.extend(self.block_features(std::slice::from_ref(&layout.block)).features);
            features.extend(self.strip_features(&layout.strips).features);
            features.extend(self.lot_features(&layout.lots).features);
        }
        collection(features)
    }
}

pub fn to_json(fc: FeatureCollection) -> Result<String> {
    let gj = GeoJson::from(fc);
    let output = serde_json::to_string_pretty(&gj)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlanConfig;
    use geo::Coord;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn street_features_carry_ids_and_colors() {
        let mut plan = StreetPlan::new(PlanConfig::default());
        plan.insert_line_string(&[c(0.0, 0.0), c(1.0, 0.0), c(2.0, 0.0)], None).unwrap();
        let fc = plan.street_edge_features();
        assert_eq!(fc.features.len(), 2);
        for f in &fc.features {
            assert_eq!(
                f.property("logicalStreetId").unwrap().as_str().unwrap(),
                "street-0"
            );
            assert!(f
                .property("color")
                .unwrap()
                .as_str()
                .unwrap()
                .starts_with('#'));
        }
        let json = to_json(fc).unwrap();
        assert!(json.contains("FeatureCollection"));
    }

    #[test]
    fn full_layout_serializes() {
        let mut plan = StreetPlan::new(PlanConfig::default());
        plan.insert_line_string(&[c(0.0, 0.0), c(60.0, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(60.0, 0.0), c(60.0, 60.0)], None).unwrap();
        plan.insert_line_string(&[c(60.0, 60.0), c(0.0, 60.0)], None).unwrap();
        plan.insert_line_string(&[c(0.0, 60.0), c(0.0, 0.0)], None).unwrap();
        let layouts = plan.generate();
        let fc = plan.layout_features(&layouts);
        assert!(!fc.features.is_empty());
        let json = to_json(fc).unwrap();
        assert!(json.contains("\"type\""));
    }
}
