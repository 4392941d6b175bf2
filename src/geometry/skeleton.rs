//! Straight-skeleton band faces: the region of a polygon between its boundary and the inward
//! offset at a given depth, partitioned per boundary edge by the interior angle bisectors at the
//! edge's endpoints. Exact for convex polygons.

use geo::{Area, BooleanOps, Coord, Line, MultiPolygon, Polygon};

use super::{inset_polygon, polygon_from_ring, pts_equal, ring_signed_area, EPSILON};

/// Band faces below this area are discarded as numeric noise.
pub const MIN_FACE_AREA: f64 = 1e-4;

#[derive(Clone, Debug)]
pub struct SkeletonFace {
    pub polygon: Polygon,
    /// The boundary segment of the source polygon this face fronts.
    pub exterior_segment: Line,
}

/// Faces of the band between `poly`'s boundary and its inward offset at `depth`. When the offset
/// collapses the polygon entirely, the band is the whole polygon.
pub fn skeleton_band_faces(poly: &Polygon, depth: f64) -> Vec<SkeletonFace> {
    let pts = ring_points_ccw(poly);
    if pts.len() < 3 {
        return Vec::new();
    }
    let inset = inset_polygon(poly, depth);
    let inset_mp = inset.map(|p| MultiPolygon(vec![p]));

    let n = pts.len();
    let mut faces = Vec::new();
    // Wedges can overlap once the offset core collapses; subtracting what earlier edges already
    // claimed keeps the faces a partition of the band.
    let mut taken: MultiPolygon = MultiPolygon(Vec::new());
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        let Some(wedge) = edge_wedge(&pts, i, depth) else {
            continue;
        };
        let clipped = poly.intersection(&wedge);
        let mut band = match &inset_mp {
            Some(inner) => clipped.difference(inner),
            None => clipped,
        };
        if !taken.0.is_empty() {
            band = band.difference(&taken);
        }
        for face in band.0 {
            if face.unsigned_area() < MIN_FACE_AREA {
                continue;
            }
            taken = taken.union(&MultiPolygon(vec![face.clone()]));
            faces.push(SkeletonFace {
                polygon: face,
                exterior_segment: Line::new(a, b),
            });
        }
    }
    faces
}

/// The exterior ring's distinct vertices in counter-clockwise order.
fn ring_points_ccw(poly: &Polygon) -> Vec<Coord> {
    let mut pts: Vec<Coord> = Vec::new();
    for &p in &poly.exterior().0 {
        if pts.last().map_or(true, |&last| !pts_equal(last, p)) {
            pts.push(p);
        }
    }
    if pts.len() > 1 && pts_equal(pts[0], pts[pts.len() - 1]) {
        pts.pop();
    }
    if ring_signed_area(poly.exterior()) < 0.0 {
        pts.reverse();
    }
    pts
}

/// Quad between edge i and the interior bisectors at its endpoints, reaching past `depth`.
fn edge_wedge(pts: &[Coord], i: usize, depth: f64) -> Option<Polygon> {
    let n = pts.len();
    let a = pts[i];
    let b = pts[(i + 1) % n];
    let dir = unit(Coord {
        x: b.x - a.x,
        y: b.y - a.y,
    })?;
    let bis_a = interior_bisector(pts[(i + n - 1) % n], a, b)?;
    let bis_b = interior_bisector(a, b, pts[(i + 2) % n])?;
    let reach_a = bisector_reach(dir, bis_a, depth);
    let reach_b = bisector_reach(dir, bis_b, depth);
    // If the endpoint bisectors cross before either reach runs out, the face closes into a
    // triangle there; carrying the full quad would fold it into a bowtie.
    if let Some((t_a, t_b)) = ray_ray_intersection(a, bis_a, b, bis_b) {
        if t_a > 0.0 && t_b > 0.0 && t_a < reach_a && t_b < reach_b {
            let apex = Coord {
                x: a.x + bis_a.x * t_a,
                y: a.y + bis_a.y * t_a,
            };
            return Some(polygon_from_ring(vec![a, b, apex]));
        }
    }
    Some(polygon_from_ring(vec![
        a,
        b,
        Coord {
            x: b.x + bis_b.x * reach_b,
            y: b.y + bis_b.y * reach_b,
        },
        Coord {
            x: a.x + bis_a.x * reach_a,
            y: a.y + bis_a.y * reach_a,
        },
    ]))
}

/// Ray parameters (t1, t2) where p1 + t1*d1 meets p2 + t2*d2, if the rays aren't parallel.
fn ray_ray_intersection(p1: Coord, d1: Coord, p2: Coord, d2: Coord) -> Option<(f64, f64)> {
    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let t1 = (dx * d2.y - dy * d2.x) / denom;
    let t2 = (dx * d1.y - dy * d1.x) / denom;
    Some((t1, t2))
}

/// Interior angle bisector direction at `at`, for counter-clockwise boundary travel prev -> at ->
/// next. Falls back to the incoming edge normal at straight joints.
fn interior_bisector(prev: Coord, at: Coord, next: Coord) -> Option<Coord> {
    let n1 = left_unit_normal(prev, at)?;
    let n2 = left_unit_normal(at, next)?;
    unit(Coord {
        x: n1.x + n2.x,
        y: n1.y + n2.y,
    })
    .or(Some(n1))
}

fn left_unit_normal(a: Coord, b: Coord) -> Option<Coord> {
    let dir = unit(Coord {
        x: b.x - a.x,
        y: b.y - a.y,
    })?;
    Some(Coord {
        x: -dir.y,
        y: dir.x,
    })
}

fn unit(v: Coord) -> Option<Coord> {
    let len = (v.x * v.x + v.y * v.y).sqrt();
    if len <= EPSILON {
        return None;
    }
    Some(Coord {
        x: v.x / len,
        y: v.y / len,
    })
}

/// Distance along the bisector needed to clear `depth` perpendicular to the edge, with headroom
/// so the wedge always reaches past the offset boundary.
fn bisector_reach(edge_dir: Coord, bisector: Coord, depth: f64) -> f64 {
    let sin = (edge_dir.x * bisector.y - edge_dir.y * bisector.x).abs();
    depth / sin.max(0.05) * 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    fn square(side: f64) -> Polygon {
        polygon_from_ring(vec![c(0.0, 0.0), c(side, 0.0), c(side, side), c(0.0, side)])
    }

    #[test]
    fn shallow_band_yields_one_trapezoid_per_edge() {
        let faces = skeleton_band_faces(&square(10.0), 2.0);
        assert_eq!(faces.len(), 4);
        for face in &faces {
            // Trapezoid between a side of length 10 and the inner square's side of length 6.
            assert_relative_eq!(face.polygon.unsigned_area(), 16.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn deep_band_covers_the_whole_square_as_triangles() {
        let faces = skeleton_band_faces(&square(10.0), 40.0);
        assert_eq!(faces.len(), 4);
        let total: f64 = faces.iter().map(|f| f.polygon.unsigned_area()).sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-6);
        for face in &faces {
            assert_relative_eq!(face.polygon.unsigned_area(), 25.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn faces_carry_their_boundary_segment() {
        let faces = skeleton_band_faces(&square(10.0), 2.0);
        let bottom = faces
            .iter()
            .find(|f| pts_equal(f.exterior_segment.start, c(0.0, 0.0)))
            .unwrap();
        assert!(pts_equal(bottom.exterior_segment.end, c(10.0, 0.0)));
        // The face hugs its edge: every point of the segment is on the face boundary.
        assert!(bottom
            .polygon
            .exterior()
            .0
            .iter()
            .any(|&v| pts_equal(v, c(0.0, 0.0))));
    }
}
