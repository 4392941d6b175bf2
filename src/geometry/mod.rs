//! Planar geometry primitives shared by the graph, polygonizer and the block pipeline. Everything
//! here works in world units on `geo` types; callers convert meters before reaching this layer.

use geo::{Contains, Coord, Intersects, Line, LineString, MultiPolygon, Point, Polygon, Rect};

mod buffer;
mod skeleton;
mod slice;

pub use buffer::{buffer_polygon, inset_polygon, offset_polyline};
pub use skeleton::{skeleton_band_faces, SkeletonFace, MIN_FACE_AREA};
pub use slice::polygon_slice;

/// Coordinate deduplication tolerance.
pub const EPSILON: f64 = 1e-10;

/// Parametric solves with a denominator below this are treated as parallel.
const INTERSECTION_DENOM_TOLERANCE: f64 = 1e-15;

/// Lenient band around [0, 1] for intersection parameters.
const INTERSECTION_PARAM_SLOP: f64 = 1e-10;

pub fn dist(a: Coord, b: Coord) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

pub fn pts_equal(a: Coord, b: Coord) -> bool {
    dist(a, b) <= EPSILON
}

/// Intersection of segments (p1, p2) and (p3, p4) by parametric solve. Returns `None` for
/// near-parallel segments or when the crossing falls outside both segments.
pub fn segment_intersection(p1: Coord, p2: Coord, p3: Coord, p4: Coord) -> Option<Coord> {
    let denom = (p4.y - p3.y) * (p2.x - p1.x) - (p4.x - p3.x) * (p2.y - p1.y);
    if denom.abs() < INTERSECTION_DENOM_TOLERANCE {
        return None;
    }
    let ua = ((p4.x - p3.x) * (p1.y - p3.y) - (p4.y - p3.y) * (p1.x - p3.x)) / denom;
    let ub = ((p2.x - p1.x) * (p1.y - p3.y) - (p2.y - p1.y) * (p1.x - p3.x)) / denom;
    let lo = -INTERSECTION_PARAM_SLOP;
    let hi = 1.0 + INTERSECTION_PARAM_SLOP;
    if ua < lo || ua > hi || ub < lo || ub > hi {
        return None;
    }
    Some(Coord {
        x: p1.x + ua * (p2.x - p1.x),
        y: p1.y + ua * (p2.y - p1.y),
    })
}

/// Sign of the cross product of (p2 - p1) and (q - p2): +1 for a left turn, -1 for a right turn,
/// 0 for collinear.
pub fn orientation_index(p1: Coord, p2: Coord, q: Coord) -> i32 {
    let cross = (p2.x - p1.x) * (q.y - p2.y) - (p2.y - p1.y) * (q.x - p2.x);
    if cross > 0.0 {
        1
    } else if cross < 0.0 {
        -1
    } else {
        0
    }
}

/// Point-in-polygon test. With `ignore_boundary`, points exactly on the boundary count as
/// outside; otherwise they count as inside.
pub fn point_in_polygon(q: Coord, poly: &Polygon, ignore_boundary: bool) -> bool {
    let pt = Point::new(q.x, q.y);
    if ignore_boundary {
        poly.contains(&pt)
    } else {
        poly.intersects(&pt)
    }
}

pub fn closest_point_on_segment(p: Coord, a: Coord, b: Coord) -> Coord {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq <= EPSILON * EPSILON {
        return a;
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    Coord {
        x: a.x + t * dx,
        y: a.y + t * dy,
    }
}

pub fn point_to_segment_distance(p: Coord, a: Coord, b: Coord) -> f64 {
    dist(p, closest_point_on_segment(p, a, b))
}

pub fn point_to_polyline_distance(p: Coord, line: &LineString) -> f64 {
    line.lines()
        .map(|seg| point_to_segment_distance(p, seg.start, seg.end))
        .fold(f64::INFINITY, f64::min)
}

/// Unsigned angle between two vectors, in [0, pi].
pub fn angle_between(v1: Coord, v2: Coord) -> f64 {
    let len1 = (v1.x * v1.x + v1.y * v1.y).sqrt();
    let len2 = (v2.x * v2.x + v2.y * v2.y).sqrt();
    if len1 <= EPSILON || len2 <= EPSILON {
        return 0.0;
    }
    let cos = ((v1.x * v2.x + v1.y * v2.y) / (len1 * len2)).clamp(-1.0, 1.0);
    cos.acos()
}

/// Signed area of a closed coordinate ring by the shoelace formula. Positive means
/// counter-clockwise winding.
pub fn ring_signed_area(ring: &LineString) -> f64 {
    let pts = &ring.0;
    if pts.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for w in pts.windows(2) {
        sum += w[0].x * w[1].y - w[1].x * w[0].y;
    }
    // Close the ring if the caller didn't.
    if !pts_equal(pts[0], pts[pts.len() - 1]) {
        let a = pts[pts.len() - 1];
        let b = pts[0];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

/// Envelope containment, inclusive on the boundary.
pub fn envelope_contains(outer: &Rect, inner: &Rect) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

pub fn envelopes_equal(a: &Rect, b: &Rect) -> bool {
    pts_equal(a.min(), b.min()) && pts_equal(a.max(), b.max())
}

/// Segments of `subject` that lie along `other`, within `tolerance`. Both endpoints and the
/// midpoint of a segment must sit on `other` for it to count.
pub fn line_overlap(subject: &LineString, other: &LineString, tolerance: f64) -> Vec<Line> {
    let mut out = Vec::new();
    for seg in subject.lines() {
        let mid = Coord {
            x: (seg.start.x + seg.end.x) / 2.0,
            y: (seg.start.y + seg.end.y) / 2.0,
        };
        if point_to_polyline_distance(seg.start, other) <= tolerance
            && point_to_polyline_distance(seg.end, other) <= tolerance
            && point_to_polyline_distance(mid, other) <= tolerance
        {
            out.push(seg);
        }
    }
    out
}

/// Joins segments end-to-end into one polyline, matching endpoints within `EPSILON`. Segments
/// that can't be attached are dropped; the longest assembled chain wins.
pub fn stitch_segments(mut segments: Vec<Line>) -> LineString {
    if segments.is_empty() {
        return LineString::new(Vec::new());
    }
    let first = segments.remove(0);
    let mut pts = vec![first.start, first.end];
    let mut progress = true;
    while progress && !segments.is_empty() {
        progress = false;
        let mut i = 0;
        while i < segments.len() {
            let seg = segments[i];
            if pts_equal(seg.start, *pts.last().unwrap()) {
                pts.push(seg.end);
                segments.remove(i);
                progress = true;
            } else if pts_equal(seg.end, pts[0]) {
                pts.insert(0, seg.start);
                segments.remove(i);
                progress = true;
            } else {
                i += 1;
            }
        }
    }
    if !segments.is_empty() {
        debug!(
            "stitch_segments: {} segment(s) could not be joined end-to-end",
            segments.len()
        );
    }
    LineString::new(pts)
}

/// Builds a closed, counter-clockwise polygon from a bare ring of points.
pub fn polygon_from_ring(mut pts: Vec<Coord>) -> Polygon {
    if let (Some(first), Some(last)) = (pts.first().copied(), pts.last().copied()) {
        if !pts_equal(first, last) {
            pts.push(first);
        }
    }
    let mut ring = LineString::new(pts);
    if ring_signed_area(&ring) < 0.0 {
        ring.0.reverse();
    }
    Polygon::new(ring, Vec::new())
}

/// The largest polygon of a multipolygon, by unsigned area.
pub fn largest_polygon(mp: MultiPolygon) -> Option<Polygon> {
    use geo::Area;
    mp.0.into_iter()
        .max_by(|a, b| {
            a.unsigned_area()
                .partial_cmp(&b.unsigned_area())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}
