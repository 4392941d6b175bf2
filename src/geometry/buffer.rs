//! Planar offsetting with miter joins. Collapsing insets return `None` rather than inverted
//! geometry.

use geo::{Coord, LineString, Polygon};

use super::{pts_equal, ring_signed_area, EPSILON};

fn normalize(v: Coord) -> Option<Coord> {
    let len = (v.x * v.x + v.y * v.y).sqrt();
    if len <= EPSILON {
        return None;
    }
    Some(Coord {
        x: v.x / len,
        y: v.y / len,
    })
}

/// Unit normal pointing to the left of the direction a -> b.
fn left_normal(a: Coord, b: Coord) -> Option<Coord> {
    let dir = normalize(Coord {
        x: b.x - a.x,
        y: b.y - a.y,
    })?;
    Some(Coord {
        x: -dir.y,
        y: dir.x,
    })
}

/// Intersection of two infinite lines, each given by a point and a direction.
fn line_line_intersection(p1: Coord, d1: Coord, p2: Coord, d2: Coord) -> Option<Coord> {
    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = ((p2.x - p1.x) * d2.y - (p2.y - p1.y) * d2.x) / denom;
    Some(Coord {
        x: p1.x + t * d1.x,
        y: p1.y + t * d1.y,
    })
}

/// Offsets an open polyline to the left of its direction of travel by `distance` (negative moves
/// right). Joints are mitered; degenerate segments are skipped.
pub fn offset_polyline(line: &LineString, distance: f64) -> LineString {
    let pts: Vec<Coord> = dedup_points(&line.0);
    if pts.len() < 2 {
        return LineString::new(pts);
    }
    let mut out: Vec<Coord> = Vec::with_capacity(pts.len());
    for i in 0..pts.len() {
        let shifted = if i == 0 {
            shift_point(pts[0], pts[0], pts[1], distance)
        } else if i == pts.len() - 1 {
            shift_point(pts[i], pts[i - 1], pts[i], distance)
        } else {
            miter_point(pts[i - 1], pts[i], pts[i + 1], distance)
        };
        if let Some(p) = shifted {
            out.push(p);
        }
    }
    LineString::new(out)
}

fn shift_point(p: Coord, a: Coord, b: Coord, distance: f64) -> Option<Coord> {
    let n = left_normal(a, b)?;
    Some(Coord {
        x: p.x + n.x * distance,
        y: p.y + n.y * distance,
    })
}

fn miter_point(prev: Coord, at: Coord, next: Coord, distance: f64) -> Option<Coord> {
    let n1 = left_normal(prev, at)?;
    let n2 = left_normal(at, next)?;
    let p1 = Coord {
        x: prev.x + n1.x * distance,
        y: prev.y + n1.y * distance,
    };
    let p2 = Coord {
        x: at.x + n2.x * distance,
        y: at.y + n2.y * distance,
    };
    let d1 = Coord {
        x: at.x - prev.x,
        y: at.y - prev.y,
    };
    let d2 = Coord {
        x: next.x - at.x,
        y: next.y - at.y,
    };
    line_line_intersection(p1, d1, p2, d2).or_else(|| {
        // Nearly collinear joint: the plain shifted point is exact.
        Some(Coord {
            x: at.x + n1.x * distance,
            y: at.y + n1.y * distance,
        })
    })
}

fn dedup_points(pts: &[Coord]) -> Vec<Coord> {
    let mut out: Vec<Coord> = Vec::with_capacity(pts.len());
    for &p in pts {
        if out.last().map_or(true, |&last| !pts_equal(last, p)) {
            out.push(p);
        }
    }
    out
}

/// Offsets a closed ring towards its interior by `distance`. Returns `None` when the offset
/// collapses the ring (sign flip, growth, or fewer than three surviving vertices).
fn offset_ring_inward(ring: &LineString, distance: f64) -> Option<LineString> {
    let mut pts = dedup_points(&ring.0);
    if pts.len() > 1 && pts_equal(pts[0], pts[pts.len() - 1]) {
        pts.pop();
    }
    if pts.len() < 3 {
        return None;
    }
    let area = ring_signed_area(ring);
    if area.abs() <= EPSILON {
        return None;
    }
    // Interior is to the left of travel for counter-clockwise rings, to the right otherwise.
    let inward = if area > 0.0 { distance } else { -distance };
    let n = pts.len();
    let mut out: Vec<Coord> = Vec::with_capacity(n + 1);
    for i in 0..n {
        let prev = pts[(i + n - 1) % n];
        let at = pts[i];
        let next = pts[(i + 1) % n];
        out.push(miter_point(prev, at, next, inward)?);
    }
    out.push(out[0]);
    let offset = LineString::new(out);
    let new_area = ring_signed_area(&offset);
    if new_area.abs() <= EPSILON {
        return None;
    }
    if distance > 0.0 {
        // An inward offset must shrink the ring and keep its winding.
        if new_area.signum() != area.signum() || new_area.abs() >= area.abs() {
            return None;
        }
    } else if new_area.signum() != area.signum() || new_area.abs() <= area.abs() {
        return None;
    }
    Some(offset)
}

/// Insets a polygon's exterior inward by `distance` (world units). Interior rings are carried
/// through unchanged. Returns `None` when the inset collapses the polygon.
pub fn inset_polygon(poly: &Polygon, distance: f64) -> Option<Polygon> {
    if distance <= 0.0 {
        return Some(poly.clone());
    }
    let exterior = offset_ring_inward(poly.exterior(), distance)?;
    Some(Polygon::new(exterior, poly.interiors().to_vec()))
}

/// Buffers a polygon by `radius` world units: positive grows it, negative shrinks it. Negative
/// buffers that collapse the geometry return `None`.
pub fn buffer_polygon(poly: &Polygon, radius: f64) -> Option<Polygon> {
    if radius == 0.0 {
        Some(poly.clone())
    } else if radius > 0.0 {
        let exterior = offset_ring_inward(poly.exterior(), -radius)?;
        Some(Polygon::new(exterior, poly.interiors().to_vec()))
    } else {
        inset_polygon(poly, -radius)
    }
}
