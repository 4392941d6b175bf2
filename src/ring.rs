use std::collections::HashMap;

use geo::{BoundingRect, LineString, Polygon, Rect};

use crate::geometry::{self, point_in_polygon, ring_signed_area};
use crate::graph::PlanarGraph;
use crate::ids::{EdgeID, NodeID};

/// A closed cycle of directed edges; one face of the planar subdivision.
#[derive(Clone, Debug)]
pub struct EdgeRing {
    /// Directed endpoints of each edge, in traversal order.
    pub edges: Vec<(NodeID, NodeID)>,
    /// The closed coordinate ring: `from` of each edge plus the first again.
    pub ring: LineString,
    /// Interior rings punched by holes assigned to this shell.
    pub holes: Vec<LineString>,
}

impl EdgeRing {
    pub fn signed_area(&self) -> f64 {
        ring_signed_area(&self.ring)
    }

    /// Shells wind counter-clockwise; holes clockwise.
    pub fn is_hole(&self) -> bool {
        self.signed_area() <= 0.0
    }

    pub fn envelope(&self) -> Option<Rect> {
        self.ring.bounding_rect()
    }

    /// The ring as a polygon, exterior plus any assigned holes.
    pub fn polygon(&self) -> Polygon {
        Polygon::new(self.ring.clone(), self.holes.clone())
    }
}

/// Computes the minimal enclosed rings of the graph and classifies them into shells. Operates on
/// a copy; the input graph is left intact.
pub fn polygonize(graph: &PlanarGraph) -> Vec<EdgeRing> {
    let mut g = graph.copy();

    remove_dangles(&mut g);

    // First labeling finds cut edges: both directions of a bridge land in the same ring.
    let next = compute_next(&g);
    let label = label_rings(&g, &next);
    let cut_edges: Vec<EdgeID> = g
        .edges
        .values()
        .filter(|e| e.is_canonical() && label.get(&e.id) == label.get(&e.sym))
        .map(|e| e.id)
        .collect();
    for e in cut_edges {
        debug!("Removing cut edge {}", e);
        g.remove_edge_pair(e);
    }

    // Relabel the pruned graph, then relink at self-intersection nodes so every maximal ring
    // breaks down into minimal ones.
    let mut next = compute_next(&g);
    let label = label_rings(&g, &next);
    relink_intersection_nodes(&g, &label, &mut next);

    let rings = materialize_rings(&g, &next);
    classify(rings)
}

/// A node with one or zero arriving edges can't be part of any enclosed ring. Removing one may
/// expose another, so keep going until none are left.
fn remove_dangles(g: &mut PlanarGraph) {
    let mut queue: Vec<NodeID> = g
        .nodes
        .values()
        .filter(|n| n.inner.len() <= 1)
        .map(|n| n.id.clone())
        .collect();
    while let Some(id) = queue.pop() {
        let Some(node) = g.nodes.get(&id) else {
            continue;
        };
        if node.inner.len() > 1 {
            continue;
        }
        let neighbors: Vec<NodeID> = node.outer.iter().map(|e| g.edges[e].to.clone()).collect();
        debug!("Removing dangling {}", id);
        g.remove_node(&id);
        for n in neighbors {
            if g.nodes.get(&n).map_or(false, |n2| n2.inner.len() <= 1) {
                queue.push(n);
            }
        }
    }
}

// Chain each arriving edge to the outgoing edge that keeps the enclosed face on its left: the
// previous neighbor in the counter-clockwise ordering of the node's exits.
fn compute_next(g: &PlanarGraph) -> HashMap<EdgeID, EdgeID> {
    let mut next = HashMap::new();
    for node in g.nodes.values() {
        let n = node.outer.len();
        for i in 0..n {
            let arriving = g.edges[&node.outer[i]].sym;
            next.insert(arriving, node.outer[(i + n - 1) % n]);
        }
    }
    next
}

/// Walks `next` pointers from every unlabeled edge, assigning one label per discovered ring.
fn label_rings(g: &PlanarGraph, next: &HashMap<EdgeID, EdgeID>) -> HashMap<EdgeID, usize> {
    let mut label: HashMap<EdgeID, usize> = HashMap::new();
    let mut counter = 0;
    for start in g.edges.keys() {
        if label.contains_key(start) {
            continue;
        }
        let mut cur = *start;
        loop {
            label.insert(cur, counter);
            let Some(&n) = next.get(&cur) else {
                break;
            };
            cur = n;
            if cur == *start || label.contains_key(&cur) {
                break;
            }
        }
        counter += 1;
    }
    label
}

// At a node where a ring passes through more than once, relink its arriving edges to its
// outgoing edges in the opposite rotational direction, so the self-touching maximal ring closes
// into minimal lobes instead.
fn relink_intersection_nodes(
    g: &PlanarGraph,
    label: &HashMap<EdgeID, usize>,
    next: &mut HashMap<EdgeID, EdgeID>,
) {
    for node in g.nodes.values() {
        let mut ring_degree: HashMap<usize, usize> = HashMap::new();
        for e in &node.outer {
            if let Some(&l) = label.get(e) {
                *ring_degree.entry(l).or_default() += 1;
            }
        }
        for (&ring_label, &degree) in &ring_degree {
            if degree <= 1 {
                continue;
            }
            let mut first_out: Option<EdgeID> = None;
            let mut prev_in: Option<EdgeID> = None;
            for de in &node.outer {
                let sym = g.edges[de].sym;
                let is_out = label.get(de) == Some(&ring_label);
                let is_in = label.get(&sym) == Some(&ring_label);
                if is_in {
                    prev_in = Some(sym);
                }
                if is_out {
                    if let Some(p) = prev_in.take() {
                        next.insert(p, *de);
                    }
                    if first_out.is_none() {
                        first_out = Some(*de);
                    }
                }
            }
            if let (Some(p), Some(f)) = (prev_in, first_out) {
                next.insert(p, f);
            }
        }
    }
}

fn materialize_rings(g: &PlanarGraph, next: &HashMap<EdgeID, EdgeID>) -> Vec<EdgeRing> {
    let mut visited: HashMap<EdgeID, bool> = HashMap::new();
    let mut rings = Vec::new();
    for start in g.edges.keys() {
        if visited.get(start).copied().unwrap_or(false) {
            continue;
        }
        let mut chain: Vec<EdgeID> = Vec::new();
        let mut cur = *start;
        let mut closed = false;
        loop {
            visited.insert(cur, true);
            chain.push(cur);
            let Some(&n) = next.get(&cur) else {
                break;
            };
            cur = n;
            if cur == *start {
                closed = true;
                break;
            }
            if visited.get(&cur).copied().unwrap_or(false) {
                break;
            }
        }
        if !closed {
            warn!("Dropping an unclosed edge chain of {} edge(s)", chain.len());
            continue;
        }
        let mut pts = Vec::with_capacity(chain.len() + 1);
        let mut edges = Vec::with_capacity(chain.len());
        for e in &chain {
            let edge = &g.edges[e];
            pts.push(g.nodes[&edge.from].point);
            edges.push((edge.from.clone(), edge.to.clone()));
        }
        pts.push(pts[0]);
        rings.push(EdgeRing {
            edges,
            ring: LineString::new(pts),
            holes: Vec::new(),
        });
    }
    rings
}

// Positive rings are shells. A negative ring strictly inside some shell becomes that shell's
// hole. A negative ring whose edges were all consumed by shells is the reverse traversal of a
// component's outer boundary and encloses nothing. Anything else is promoted to a stand-alone
// shell.
fn classify(rings: Vec<EdgeRing>) -> Vec<EdgeRing> {
    let mut shells = Vec::new();
    let mut holes = Vec::new();
    for ring in rings {
        if ring.is_hole() {
            holes.push(ring);
        } else {
            shells.push(ring);
        }
    }

    let consumed: std::collections::HashSet<(NodeID, NodeID)> = shells
        .iter()
        .flat_map(|s| s.edges.iter().cloned())
        .collect();

    for hole in holes {
        if let Some(idx) = find_shell_containing(&hole, &shells) {
            shells[idx].holes.push(hole.ring.clone());
            continue;
        }
        let is_outer_boundary = hole
            .edges
            .iter()
            .all(|(a, b)| consumed.contains(&(b.clone(), a.clone())));
        if is_outer_boundary {
            continue;
        }
        debug!("Promoting an unassigned hole of {} edge(s) to a shell", hole.edges.len());
        shells.push(promote_hole(hole));
    }
    shells
}

/// The smallest shell whose envelope strictly contains the hole's and whose polygon contains
/// every hole vertex.
fn find_shell_containing(hole: &EdgeRing, shells: &[EdgeRing]) -> Option<usize> {
    let hole_env = hole.envelope()?;
    let mut best: Option<(usize, f64)> = None;
    for (i, shell) in shells.iter().enumerate() {
        let Some(shell_env) = shell.envelope() else {
            continue;
        };
        if geometry::envelopes_equal(&shell_env, &hole_env)
            || !geometry::envelope_contains(&shell_env, &hole_env)
        {
            continue;
        }
        let poly = Polygon::new(shell.ring.clone(), Vec::new());
        if !hole.ring.0.iter().all(|&v| point_in_polygon(v, &poly, false)) {
            continue;
        }
        let size = shell_env.width() * shell_env.height();
        if best.map_or(true, |(_, s)| size < s) {
            best = Some((i, size));
        }
    }
    best.map(|(i, _)| i)
}

fn promote_hole(hole: EdgeRing) -> EdgeRing {
    let mut ring = hole.ring.clone();
    ring.0.reverse();
    let edges = hole
        .edges
        .into_iter()
        .rev()
        .map(|(a, b)| (b, a))
        .collect();
    EdgeRing {
        edges,
        ring,
        holes: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{Area, Coord};

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    fn square_graph() -> PlanarGraph {
        let mut g = PlanarGraph::new();
        g.insert_line_string(&[c(0.0, 0.0), c(1.0, 0.0)], None);
        g.insert_line_string(&[c(1.0, 0.0), c(1.0, 1.0)], None);
        g.insert_line_string(&[c(1.0, 1.0), c(0.0, 1.0)], None);
        g.insert_line_string(&[c(0.0, 1.0), c(0.0, 0.0)], None);
        g
    }

    #[test]
    fn unit_square_yields_one_shell() {
        let shells = polygonize(&square_graph());
        assert_eq!(shells.len(), 1);
        assert_relative_eq!(shells[0].polygon().unsigned_area(), 1.0, epsilon = 1e-9);
        assert!(!shells[0].is_hole());
    }

    #[test]
    fn polygonize_leaves_the_graph_intact() {
        let g = square_graph();
        let nodes_before = g.nodes.len();
        let edges_before = g.edges.len();
        polygonize(&g);
        assert_eq!(g.nodes.len(), nodes_before);
        assert_eq!(g.edges.len(), edges_before);
    }

    #[test]
    fn square_split_both_ways_yields_four_quadrants() {
        let mut g = square_graph();
        g.insert_line_string(&[c(0.0, 0.5), c(1.0, 0.5)], None);
        g.insert_line_string(&[c(0.5, 0.0), c(0.5, 1.0)], None);
        assert!(g.find_nearest_node(c(0.5, 0.5), 1e-9).is_some());

        let shells = polygonize(&g);
        assert_eq!(shells.len(), 4);
        for shell in &shells {
            assert_relative_eq!(shell.polygon().unsigned_area(), 0.25, epsilon = 1e-9);
        }
    }

    #[test]
    fn dangles_are_removed_recursively() {
        let mut g = square_graph();
        // A two-segment antenna hanging off a corner.
        g.insert_line_string(&[c(1.0, 1.0), c(2.0, 1.0), c(3.0, 1.0)], None);
        let shells = polygonize(&g);
        assert_eq!(shells.len(), 1);
        assert_relative_eq!(shells[0].polygon().unsigned_area(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn a_bridge_between_two_loops_is_a_cut_edge() {
        let mut g = square_graph();
        g.insert_line_string(&[c(2.0, 0.0), c(3.0, 0.0)], None);
        g.insert_line_string(&[c(3.0, 0.0), c(3.0, 1.0)], None);
        g.insert_line_string(&[c(3.0, 1.0), c(2.0, 1.0)], None);
        g.insert_line_string(&[c(2.0, 1.0), c(2.0, 0.0)], None);
        // The bridge joins the two squares without enclosing anything.
        g.insert_line_string(&[c(1.0, 1.0), c(2.0, 1.0)], None);

        let shells = polygonize(&g);
        assert_eq!(shells.len(), 2);
        for shell in &shells {
            assert_relative_eq!(shell.polygon().unsigned_area(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn figure_eight_splits_into_two_rings() {
        let mut g = PlanarGraph::new();
        g.insert_line_string(
            &[
                c(0.0, 0.0),
                c(1.0, 0.0),
                c(1.0, 1.0),
                c(0.0, 1.0),
                c(0.0, 0.0),
            ],
            None,
        );
        g.insert_line_string(
            &[
                c(1.0, 1.0),
                c(2.0, 1.0),
                c(2.0, 2.0),
                c(1.0, 2.0),
                c(1.0, 1.0),
            ],
            None,
        );
        let shells = polygonize(&g);
        assert_eq!(shells.len(), 2);
        for shell in &shells {
            assert_relative_eq!(shell.polygon().unsigned_area(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn island_component_becomes_a_hole_and_a_shell() {
        let mut g = PlanarGraph::new();
        // Outer loop 10x10, detached inner loop 2x2.
        g.insert_line_string(
            &[
                c(0.0, 0.0),
                c(10.0, 0.0),
                c(10.0, 10.0),
                c(0.0, 10.0),
                c(0.0, 0.0),
            ],
            None,
        );
        g.insert_line_string(
            &[
                c(4.0, 4.0),
                c(6.0, 4.0),
                c(6.0, 6.0),
                c(4.0, 6.0),
                c(4.0, 4.0),
            ],
            None,
        );
        let shells = polygonize(&g);
        assert_eq!(shells.len(), 2);
        let with_hole = shells.iter().find(|s| !s.holes.is_empty()).unwrap();
        assert_relative_eq!(with_hole.polygon().unsigned_area(), 96.0, epsilon = 1e-9);
        let island = shells.iter().find(|s| s.holes.is_empty()).unwrap();
        assert_relative_eq!(island.polygon().unsigned_area(), 4.0, epsilon = 1e-9);
    }
}
