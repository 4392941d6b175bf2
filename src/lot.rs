use geo::{Area, Coord, EuclideanLength, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::geometry::{self, polygon_slice};
use crate::strip::Strip;
use crate::types::Color;
use crate::StreetPlan;

/// Tolerance for recovering a strip's street edge from the block boundary.
const STREET_EDGE_EPSILON: f64 = 1e-6;

/// A street-facing parcel carved out of a strip.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lot {
    /// Stable id: the owning street's key plus an ordinal.
    pub id: String,
    pub color: Color,
    pub polygon: Polygon,
}

impl StreetPlan {
    /// Slices a strip into lots along its street edge. `ordinal_start` offsets the lot ids so a
    /// street spanning several blocks keeps them unique.
    pub fn lots_for_strip(
        &mut self,
        strip: &Strip,
        block: &Block,
        ordinal_start: usize,
    ) -> Vec<Lot> {
        let street_edge = self.street_edge_of_strip(strip, block);
        if street_edge.0.len() < 2 {
            warn!(
                "Strip of {} has no usable street edge; emitting no lots",
                strip.street
            );
            return Vec::new();
        }

        let spacing = self.config.meters(self.config.lot_width);
        let reach = self.config.meters(block.max_lot_depth + 10.0);
        let min_area = self.config.square_meters(self.config.min_lot_area);

        let mut polys = vec![strip.polygon.clone()];
        let total = street_edge.euclidean_length();
        let mut arc = spacing;
        let mut ray_ordinal = 0;
        while arc < total {
            if let Some(ray) = splitting_ray(&street_edge, arc, reach) {
                polys = apply_ray(polys, &ray, min_area, strip, ray_ordinal);
            }
            arc += spacing;
            ray_ordinal += 1;
        }

        polys
            .into_iter()
            .enumerate()
            .map(|(i, polygon)| Lot {
                id: format!("{}-lot-{}", strip.street.as_key(), ordinal_start + i),
                color: Color::random(&mut self.rng),
                polygon,
            })
            .collect()
    }

    /// The strip's boundary stitched along the block boundary: where its lots face the street.
    fn street_edge_of_strip(&self, strip: &Strip, block: &Block) -> LineString {
        let segments = geometry::line_overlap(
            strip.polygon.exterior(),
            block.polygon.exterior(),
            STREET_EDGE_EPSILON,
        );
        geometry::stitch_segments(segments)
    }
}

/// The perpendicular through the point `arc` world units along the edge, reaching `reach` to
/// each side.
fn splitting_ray(street_edge: &LineString, arc: f64, reach: f64) -> Option<LineString> {
    let mut remaining = arc;
    for seg in street_edge.lines() {
        let len = geometry::dist(seg.start, seg.end);
        if len <= 0.0 {
            continue;
        }
        if remaining > len {
            remaining -= len;
            continue;
        }
        let t = remaining / len;
        let at = Coord {
            x: seg.start.x + (seg.end.x - seg.start.x) * t,
            y: seg.start.y + (seg.end.y - seg.start.y) * t,
        };
        let dir = Coord {
            x: (seg.end.x - seg.start.x) / len,
            y: (seg.end.y - seg.start.y) / len,
        };
        let perp = Coord {
            x: -dir.y,
            y: dir.x,
        };
        return Some(LineString::new(vec![
            Coord {
                x: at.x - perp.x * reach,
                y: at.y - perp.y * reach,
            },
            Coord {
                x: at.x + perp.x * reach,
                y: at.y + perp.y * reach,
            },
        ]));
    }
    None
}

/// Applies one ray to every pending polygon, rejecting the cut for any polygon where it would
/// produce a sliver below `min_area`.
fn apply_ray(
    polys: Vec<Polygon>,
    ray: &LineString,
    min_area: f64,
    strip: &Strip,
    ray_ordinal: usize,
) -> Vec<Polygon> {
    let mut out = Vec::with_capacity(polys.len() + 1);
    for poly in polys {
        let slices = polygon_slice(&poly, ray);
        if slices.len() > 1 && slices.iter().all(|s| s.unsigned_area() >= min_area) {
            out.extend(slices);
        } else {
            if slices.len() > 1 {
                debug!(
                    "Ray {} rejected for a polygon of {}: it would leave a sliver lot",
                    ray_ordinal, strip.street
                );
            }
            out.push(poly);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StreetID;
    use crate::PlanConfig;
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
        geometry::polygon_from_ring(vec![c(x0, y0), c(x1, y0), c(x1, y1), c(x0, y1)])
    }

    fn fixture() -> (StreetPlan, Strip, Block) {
        let plan = StreetPlan::new(PlanConfig::default());
        let strip = Strip {
            street: StreetID(0),
            polygon: rect(0.0, 0.0, 120.0, 30.0),
        };
        let block = Block {
            // The strip's bottom edge lies on the block boundary; its other sides are interior.
            polygon: rect(-10.0, 0.0, 130.0, 60.0),
            streets: vec![StreetID(0)],
            max_lot_depth: 40.0,
        };
        (plan, strip, block)
    }

    #[test]
    fn a_long_strip_slices_every_lot_width() {
        let (mut plan, strip, block) = fixture();
        let lots = plan.lots_for_strip(&strip, &block, 0);
        // Rays at 25, 50, 75 and 100 m along the 120 m frontage.
        assert_eq!(lots.len(), 5);
        let total: f64 = lots.iter().map(|l| l.polygon.unsigned_area()).sum();
        assert_relative_eq!(total, 3600.0, epsilon = 1e-4);
        for lot in &lots {
            assert!(lot.polygon.unsigned_area() >= 500.0);
        }
    }

    #[test]
    fn lot_ids_are_stable_and_ordinal() {
        let (mut plan, strip, block) = fixture();
        let lots = plan.lots_for_strip(&strip, &block, 3);
        let ids: Vec<&str> = lots.iter().map(|l| l.id.as_str()).collect();
        assert!(ids.contains(&"street-0-lot-3"));
        assert!(ids.contains(&"street-0-lot-7"));
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn sliver_cuts_are_rejected() {
        let (mut plan, mut strip, block) = fixture();
        // A narrow strip: a 25 m cell is only 25 x 15 = 375 m^2, under the minimum lot area, so
        // the rays at 25, 75 and 100 m are rejected and only the cut at 50 m survives.
        strip.polygon = rect(0.0, 0.0, 120.0, 15.0);
        let lots = plan.lots_for_strip(&strip, &block, 0);
        assert_eq!(lots.len(), 2);
        let mut areas: Vec<f64> = lots.iter().map(|l| l.polygon.unsigned_area()).collect();
        areas.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(areas[0], 750.0, epsilon = 1e-4);
        assert_relative_eq!(areas[1], 1050.0, epsilon = 1e-4);
    }

    #[test]
    fn a_strip_without_frontage_emits_nothing() {
        let (mut plan, mut strip, block) = fixture();
        // Entirely interior to the block.
        strip.polygon = rect(10.0, 10.0, 50.0, 30.0);
        assert!(plan.lots_for_strip(&strip, &block, 0).is_empty());
    }
}
