use geo::Polygon;
use serde::{Deserialize, Serialize};

use crate::geometry;
use crate::ids::StreetID;
use crate::ring::{polygonize, EdgeRing};
use crate::StreetPlan;

/// The buildable interior of a street enclosure: a shell's polygon pulled in by half the street
/// width, annotated with the logical streets bounding it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub polygon: Polygon,
    /// Bounding streets, in shell traversal order.
    pub streets: Vec<StreetID>,
    /// Maximum lot depth in meters.
    pub max_lot_depth: f64,
}

impl StreetPlan {
    /// The minimal enclosed rings of the current graph. The graph itself is left untouched.
    pub fn polygonize(&self) -> Vec<EdgeRing> {
        polygonize(&self.graph)
    }

    /// One block per shell, inset by half the street width. Shells that collapse under the inset
    /// are discarded.
    pub fn blocks(&self) -> Vec<Block> {
        let inset = self.config.meters(self.config.street_width / 2.0);
        let mut blocks = Vec::new();
        for shell in self.polygonize() {
            match self.block_from_shell(&shell, inset) {
                Some(block) => blocks.push(block),
                None => {
                    info!(
                        "Discarding a shell of {} edge(s); the street inset collapses it",
                        shell.edges.len()
                    );
                }
            }
        }
        blocks
    }

    fn block_from_shell(&self, shell: &EdgeRing, inset: f64) -> Option<Block> {
        // Edges live in the copy the polygonizer worked on; resolve streets through endpoint
        // identity in the original graph.
        let mut streets: Vec<StreetID> = Vec::new();
        for (a, b) in &shell.edges {
            if let Some(sid) = self.find_street_for_endpoints(a, b) {
                if !streets.contains(&sid) {
                    streets.push(sid);
                }
            }
        }
        let polygon = geometry::inset_polygon(&shell.polygon(), inset)?;
        if polygon.exterior().0.len() < 4 {
            // A closed ring needs at least three distinct vertices.
            return None;
        }
        Some(Block {
            polygon,
            streets,
            max_lot_depth: self.config.max_lot_depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlanConfig;
    use approx::assert_relative_eq;
    use geo::{Area, Coord};

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    fn square_plan(side: f64) -> StreetPlan {
        let mut plan = StreetPlan::new(PlanConfig::default());
        plan.insert_line_string(&[c(0.0, 0.0), c(side, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(side, 0.0), c(side, side)], None).unwrap();
        plan.insert_line_string(&[c(side, side), c(0.0, side)], None).unwrap();
        plan.insert_line_string(&[c(0.0, side), c(0.0, 0.0)], None).unwrap();
        plan
    }

    #[test]
    fn a_street_loop_becomes_one_inset_block() {
        let plan = square_plan(60.0);
        let blocks = plan.blocks();
        assert_eq!(blocks.len(), 1);
        // Inset by half the 10 m street width on each side: 50 x 50.
        assert_relative_eq!(blocks[0].polygon.unsigned_area(), 2500.0, epsilon = 1e-6);
        // Four perpendicular sides stay four distinct streets.
        assert_eq!(blocks[0].streets.len(), 4);
    }

    #[test]
    fn a_tiny_loop_collapses_and_is_discarded() {
        let plan = square_plan(8.0);
        assert!(plan.blocks().is_empty());
    }

    #[test]
    fn bounding_streets_follow_shell_order() {
        let plan = square_plan(60.0);
        let blocks = plan.blocks();
        let expected: Vec<StreetID> = plan.streets.keys().copied().collect();
        let mut got = blocks[0].streets.clone();
        got.sort();
        let mut want = expected.clone();
        want.sort();
        assert_eq!(got, want);
    }
}
