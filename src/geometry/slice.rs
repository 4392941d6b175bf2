//! Cuts a polygon along a linestring by subtracting two thin one-sided ribbons built from the
//! cut line, keeping only the pieces still touching the original line. Both surviving sides are
//! bounded exactly by the cut, so no kerf is lost.

use geo::{Area, BooleanOps, Coord, LineString, Polygon};

use super::{
    offset_polyline, point_in_polygon, point_to_polyline_distance, polygon_from_ring, pts_equal,
    segment_intersection, EPSILON,
};

/// Ribbon half-widths to try, widest first. Each is comfortably above `OVERLAP_TOLERANCE` so
/// kerf-side fragments always fail the overlap test.
const RIBBON_WIDTHS: [f64; 3] = [1e-2, 1e-3, 1e-4];

/// A piece must come within this distance of the cut line to survive.
const OVERLAP_TOLERANCE: f64 = 5e-5;

/// Splits `poly` along `line`. Returns the resulting sub-polygons, or `[poly]` when the line
/// doesn't produce a usable cut.
pub fn polygon_slice(poly: &Polygon, line: &LineString) -> Vec<Polygon> {
    let keep_whole = || vec![poly.clone()];

    // Leading or trailing points strictly inside the polygon would start the cut mid-face.
    let mut pts: Vec<Coord> = line.0.clone();
    while pts
        .first()
        .map_or(false, |&p| point_in_polygon(p, poly, true))
    {
        pts.remove(0);
    }
    while pts
        .last()
        .map_or(false, |&p| point_in_polygon(p, poly, true))
    {
        pts.pop();
    }
    if pts.len() < 2 {
        return keep_whole();
    }
    let line = LineString::new(pts);

    // A cut that enters the polygon but never leaves can't split it, unless it starts or ends on
    // the boundary itself.
    let crossings = count_boundary_crossings(poly, &line);
    if crossings % 2 == 1 && !endpoint_on_boundary(poly, &line) {
        return keep_whole();
    }

    for width in RIBBON_WIDTHS {
        let Some((upper, lower)) = ribbons(&line, width) else {
            continue;
        };
        let mut pieces: Vec<Polygon> = Vec::new();
        for ribbon in [upper, lower] {
            let diff = poly.difference(&ribbon);
            for piece in diff.0 {
                if piece.unsigned_area() <= EPSILON {
                    continue;
                }
                if piece_touches_line(&piece, &line) {
                    pieces.push(piece);
                }
            }
        }
        if pieces.len() >= 2 {
            return pieces;
        }
    }
    keep_whole()
}

/// One-sided thick-line polygons on each side of the cut. `None` if an offset degenerates.
fn ribbons(line: &LineString, width: f64) -> Option<(Polygon, Polygon)> {
    let upper = ribbon_one_side(line, width)?;
    let lower = ribbon_one_side(line, -width)?;
    Some((upper, lower))
}

fn ribbon_one_side(line: &LineString, offset: f64) -> Option<Polygon> {
    let shifted = offset_polyline(line, offset);
    if shifted.0.len() != line.0.len() {
        return None;
    }
    let mut ring: Vec<Coord> = line.0.clone();
    ring.extend(shifted.0.iter().rev().copied());
    let poly = polygon_from_ring(ring);
    if poly.unsigned_area() <= EPSILON {
        return None;
    }
    Some(poly)
}

fn count_boundary_crossings(poly: &Polygon, line: &LineString) -> usize {
    let mut hits: Vec<Coord> = Vec::new();
    for cut_seg in line.lines() {
        for boundary_seg in poly.exterior().lines() {
            if let Some(x) = segment_intersection(
                cut_seg.start,
                cut_seg.end,
                boundary_seg.start,
                boundary_seg.end,
            ) {
                if !hits.iter().any(|&h| pts_equal(h, x)) {
                    hits.push(x);
                }
            }
        }
    }
    hits.len()
}

fn endpoint_on_boundary(poly: &Polygon, line: &LineString) -> bool {
    let boundary = poly.exterior();
    [line.0[0], line.0[line.0.len() - 1]]
        .into_iter()
        .any(|p| point_to_polyline_distance(p, boundary) <= EPSILON)
}

fn piece_touches_line(piece: &Polygon, line: &LineString) -> bool {
    piece
        .exterior()
        .0
        .iter()
        .any(|&v| point_to_polyline_distance(v, line) <= OVERLAP_TOLERANCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon_from_ring;
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    fn rect(w: f64, h: f64) -> Polygon {
        polygon_from_ring(vec![c(0.0, 0.0), c(w, 0.0), c(w, h), c(0.0, h)])
    }

    #[test]
    fn vertical_cut_splits_a_rectangle_in_two() {
        let poly = rect(10.0, 4.0);
        let cut = LineString::new(vec![c(6.0, -2.0), c(6.0, 6.0)]);
        let mut pieces = polygon_slice(&poly, &cut);
        assert_eq!(pieces.len(), 2);
        pieces.sort_by(|a, b| a.unsigned_area().partial_cmp(&b.unsigned_area()).unwrap());
        assert_relative_eq!(pieces[0].unsigned_area(), 16.0, epsilon = 1e-6);
        assert_relative_eq!(pieces[1].unsigned_area(), 24.0, epsilon = 1e-6);
    }

    #[test]
    fn missing_cut_keeps_the_polygon() {
        let poly = rect(10.0, 4.0);
        let cut = LineString::new(vec![c(20.0, -2.0), c(20.0, 6.0)]);
        let pieces = polygon_slice(&poly, &cut);
        assert_eq!(pieces.len(), 1);
        assert_relative_eq!(pieces[0].unsigned_area(), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn cut_ending_inside_is_rejected() {
        let poly = rect(10.0, 4.0);
        let cut = LineString::new(vec![c(6.0, -2.0), c(6.0, 2.0)]);
        let pieces = polygon_slice(&poly, &cut);
        assert_eq!(pieces.len(), 1);
    }

    #[test]
    fn cut_from_a_boundary_point_is_allowed() {
        let poly = rect(10.0, 4.0);
        // Starts exactly on the top boundary, exits through the bottom.
        let cut = LineString::new(vec![c(6.0, 4.0), c(6.0, -2.0)]);
        let pieces = polygon_slice(&poly, &cut);
        assert_eq!(pieces.len(), 2);
    }

    #[test]
    fn total_area_is_preserved() {
        let poly = rect(10.0, 4.0);
        let cut = LineString::new(vec![c(3.0, -1.0), c(3.0, 5.0)]);
        let pieces = polygon_slice(&poly, &cut);
        let total: f64 = pieces.iter().map(|p| p.unsigned_area()).sum();
        assert_relative_eq!(total, 40.0, epsilon = 1e-6);
    }
}
