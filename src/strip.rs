use geo::{Area, BooleanOps, Coord, Intersects, LineString, MultiPolygon, Point, Polygon};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::geometry::{self, polygon_slice, skeleton_band_faces, SkeletonFace};
use crate::graph::PlanarGraph;
use crate::ids::StreetID;
use crate::street::LogicalStreet;
use crate::StreetPlan;

/// Strips below this area (world units squared) are dropped.
pub const MIN_STRIP_AREA: f64 = 400.0;

/// Tolerance for matching seams between strip boundaries and the block boundary.
const SEAM_EPSILON: f64 = 1e-6;

/// The part of a block assigned to one bounding street; lots are carved from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Strip {
    pub street: StreetID,
    pub polygon: Polygon,
}

/// A boundary segment two strips share, running from the block boundary inward.
#[derive(Clone, Copy, Debug)]
struct Seam {
    boundary_pt: Coord,
    interior_pt: Coord,
}

impl StreetPlan {
    /// Splits a block into per-street strips: skeleton band faces, clustered per street, with
    /// corner regions handed from each shorter street to the longer one.
    pub fn strips_for_block(&self, block: &Block) -> Vec<Strip> {
        let depth = self.config.meters(block.max_lot_depth);
        let faces = skeleton_band_faces(&block.polygon, depth);
        if faces.is_empty() {
            warn!("A block produced no skeleton faces; skipping it");
            return Vec::new();
        }
        if faces.len() == 1 {
            // A block whose band degenerates to one face all belongs to the first street.
            let Some(&sid) = block.streets.first() else {
                return Vec::new();
            };
            return vec![Strip {
                street: sid,
                polygon: faces.into_iter().next().unwrap().polygon,
            }];
        }

        // Alpha strips: every face joins each street its exterior segment runs along.
        let mut alpha: IndexMap<StreetID, Vec<Polygon>> = IndexMap::new();
        for face in &faces {
            for &sid in &block.streets {
                let Some(street) = self.streets.get(&sid) else {
                    continue;
                };
                let tol = self.config.meters(street.width * 2.0);
                if face_fronts_street(face, street, &self.graph, tol) {
                    alpha.entry(sid).or_default().push(face.polygon.clone());
                }
            }
        }

        // Beta strips: one polygon per street.
        let mut beta: IndexMap<StreetID, MultiPolygon> = IndexMap::new();
        for (sid, faces) in alpha {
            let mut mp = MultiPolygon(Vec::new());
            for face in faces {
                mp = mp.union(&MultiPolygon(vec![face]));
            }
            beta.insert(sid, mp);
        }

        self.transfer_corners(&mut beta, block);

        let mut strips = Vec::new();
        for (sid, mp) in beta {
            if mp.0.len() > 1 {
                debug!(
                    "Strip of {} fragmented into {} parts; keeping the largest",
                    sid,
                    mp.0.len()
                );
            }
            let Some(polygon) = geometry::largest_polygon(mp) else {
                continue;
            };
            if polygon.unsigned_area() > MIN_STRIP_AREA {
                strips.push(Strip {
                    street: sid,
                    polygon,
                });
            }
        }
        strips
    }

    // For every ordered street pair sharing a corner seam, the strictly shorter street cedes the
    // corner region beyond the seam to the longer one. Transfers run sequentially against the
    // current strip geometry.
    fn transfer_corners(&self, beta: &mut IndexMap<StreetID, MultiPolygon>, block: &Block) {
        let ids: Vec<StreetID> = beta.keys().copied().collect();
        for &si in &ids {
            for &sj in &ids {
                if si == sj {
                    continue;
                }
                let li = self.streets[&si].length(&self.graph);
                let lj = self.streets[&sj].length(&self.graph);
                if li >= lj {
                    continue;
                }
                let seams = shared_corner_seams(&beta[&si], &beta[&sj], &block.polygon);
                for seam in seams {
                    self.transfer_one_corner(beta, si, sj, seam, block);
                }
            }
        }
    }

    fn transfer_one_corner(
        &self,
        beta: &mut IndexMap<StreetID, MultiPolygon>,
        source: StreetID,
        dest: StreetID,
        seam: Seam,
        block: &Block,
    ) {
        let source_mp = beta[&source].clone();
        // The seam may have moved with an earlier transfer; work from the current part under it.
        let Some(part) = source_mp
            .0
            .iter()
            .find(|p| {
                geometry::point_to_polyline_distance(seam.interior_pt, p.exterior()) <= SEAM_EPSILON
            })
            .cloned()
        else {
            return;
        };

        // Slice from the seam's inner end, through the nearest point of the strip's street
        // frontage, extended slightly past it.
        let frontage =
            geometry::line_overlap(part.exterior(), block.polygon.exterior(), SEAM_EPSILON);
        let mut closest: Option<Coord> = None;
        for seg in &frontage {
            let c = geometry::closest_point_on_segment(seam.interior_pt, seg.start, seg.end);
            if closest.map_or(true, |best| {
                geometry::dist(seam.interior_pt, c) < geometry::dist(seam.interior_pt, best)
            }) {
                closest = Some(c);
            }
        }
        let Some(c) = closest else {
            debug!("{} has no street frontage to slice against; skipping a corner", source);
            return;
        };
        let len = geometry::dist(seam.interior_pt, c);
        if len <= SEAM_EPSILON {
            return;
        }
        let overshoot = (len * 0.05).max(1e-3);
        let ext = Coord {
            x: c.x + (c.x - seam.interior_pt.x) / len * overshoot,
            y: c.y + (c.y - seam.interior_pt.y) / len * overshoot,
        };
        let cut = LineString::new(vec![seam.interior_pt, ext]);

        let slices = polygon_slice(&part, &cut);
        if slices.len() < 2 {
            debug!("Corner cut between {} and {} failed to split; keeping strips as-is", source, dest);
            return;
        }
        let Some(region) = slices
            .into_iter()
            .find(|s| s.intersects(&Point::new(seam.boundary_pt.x, seam.boundary_pt.y)))
        else {
            return;
        };
        let region = MultiPolygon(vec![region]);
        let new_source = source_mp.difference(&region);
        let new_dest = beta[&dest].union(&region);
        beta.insert(source, new_source);
        beta.insert(dest, new_dest);
    }
}

/// Does this face's exterior segment run along one of the street's edges?
fn face_fronts_street(
    face: &SkeletonFace,
    street: &LogicalStreet,
    graph: &PlanarGraph,
    tol: f64,
) -> bool {
    street.physical_edges(graph).any(|e| {
        let (a, b) = graph.edge_points(e);
        geometry::point_to_segment_distance(face.exterior_segment.start, a, b) <= tol
            && geometry::point_to_segment_distance(face.exterior_segment.end, a, b) <= tol
    })
}

/// Boundary segments of `a` that also lie on `b`'s boundary and touch the block boundary at
/// exactly one end. Oriented with the block-boundary point first.
fn shared_corner_seams(a: &MultiPolygon, b: &MultiPolygon, block: &Polygon) -> Vec<Seam> {
    let mut seams = Vec::new();
    for part in &a.0 {
        for seg in part.exterior().lines() {
            let mid = Coord {
                x: (seg.start.x + seg.end.x) / 2.0,
                y: (seg.start.y + seg.end.y) / 2.0,
            };
            let on_b = |p: Coord| {
                b.0.iter()
                    .any(|bp| geometry::point_to_polyline_distance(p, bp.exterior()) <= SEAM_EPSILON)
            };
            if !(on_b(seg.start) && on_b(seg.end) && on_b(mid)) {
                continue;
            }
            let start_on_block =
                geometry::point_to_polyline_distance(seg.start, block.exterior()) <= SEAM_EPSILON;
            let end_on_block =
                geometry::point_to_polyline_distance(seg.end, block.exterior()) <= SEAM_EPSILON;
            match (start_on_block, end_on_block) {
                (true, false) => seams.push(Seam {
                    boundary_pt: seg.start,
                    interior_pt: seg.end,
                }),
                (false, true) => seams.push(Seam {
                    boundary_pt: seg.end,
                    interior_pt: seg.start,
                }),
                // A fully interior or fully boundary-hugging shared segment is not a corner seam.
                _ => {}
            }
        }
    }
    seams
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlanConfig;
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    /// Four equal streets around a 60 m square.
    fn symmetric_plan() -> StreetPlan {
        let mut plan = StreetPlan::new(PlanConfig::default());
        plan.insert_line_string(&[c(0.0, 0.0), c(60.0, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(60.0, 0.0), c(60.0, 60.0)], None).unwrap();
        plan.insert_line_string(&[c(60.0, 60.0), c(0.0, 60.0)], None).unwrap();
        plan.insert_line_string(&[c(0.0, 60.0), c(0.0, 0.0)], None).unwrap();
        plan
    }

    #[test]
    fn equal_streets_split_a_square_block_evenly() {
        let plan = symmetric_plan();
        let blocks = plan.blocks();
        assert_eq!(blocks.len(), 1);
        let strips = plan.strips_for_block(&blocks[0]);
        // Equal lengths mean no corner transfers: four identical wedges.
        assert_eq!(strips.len(), 4);
        let total: f64 = strips.iter().map(|s| s.polygon.unsigned_area()).sum();
        assert_relative_eq!(total, 2500.0, epsilon = 1e-6);
        for strip in &strips {
            assert_relative_eq!(strip.polygon.unsigned_area(), 625.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn longer_streets_take_the_corners() {
        let mut plan = StreetPlan::new(PlanConfig::default());
        // The bottom street runs twice as long as the loop's other three sides.
        plan.insert_line_string(&[c(0.0, 0.0), c(120.0, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(0.0, 0.0), c(0.0, 60.0)], None).unwrap();
        plan.insert_line_string(&[c(0.0, 60.0), c(60.0, 60.0)], None).unwrap();
        plan.insert_line_string(&[c(60.0, 60.0), c(60.0, 0.0)], None).unwrap();

        let blocks = plan.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].streets.len(), 4);
        let strips = plan.strips_for_block(&blocks[0]);

        // The bottom street gains both lower corners (312.5 each); the side strips drop below
        // the minimum area and disappear; the top strip is untouched.
        assert_eq!(strips.len(), 2);
        let mut areas: Vec<f64> = strips.iter().map(|s| s.polygon.unsigned_area()).collect();
        areas.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_relative_eq!(areas[0], 625.0, epsilon = 1e-4);
        assert_relative_eq!(areas[1], 1250.0, epsilon = 1e-4);
    }
}
