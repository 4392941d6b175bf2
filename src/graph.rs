use geo::{Coord, Line};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::geometry::{self, EPSILON};
use crate::ids::{EdgeID, NodeID};

/// How far a snap-enabled input point may be pulled onto an existing edge, in world units.
pub const SNAP_TOLERANCE: f64 = 2e-4;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeID,
    pub point: Coord,
    /// Edges leaving this node, sorted counter-clockwise by exit direction. Ties between
    /// same-angle edges keep insertion order.
    pub outer: Vec<EdgeID>,
    /// Edges arriving at this node, in insertion order.
    pub inner: Vec<EdgeID>,
}

/// A directed segment between two nodes. Every edge travels with a symmetric partner running the
/// opposite way; the pair is created and removed atomically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeID,
    pub from: NodeID,
    pub to: NodeID,
    pub sym: EdgeID,
}

impl Edge {
    /// The endpoint that isn't `n`.
    pub fn other_endpoint(&self, n: &NodeID) -> &NodeID {
        if &self.from == n {
            &self.to
        } else {
            &self.from
        }
    }

    /// True for the first-allocated edge of a pair; use to visit each physical edge once.
    pub fn is_canonical(&self) -> bool {
        self.id < self.sym
    }
}

/// What one `insert_line_string` call did to the graph.
#[derive(Clone, Debug, Default)]
pub struct InsertEffects {
    /// Canonical ids of brand-new edges, in creation order. Some may have been split again by a
    /// later segment of the same call and no longer exist.
    pub added: Vec<EdgeID>,
    /// Splits of existing edges, in the order they happened.
    pub splits: Vec<SplitEvent>,
}

/// An existing edge pair replaced by two pairs meeting at a new interior node. Replacements are
/// recorded as (edge, sym) so consumers can patch street membership even if a replacement was
/// itself split again later in the same call.
#[derive(Clone, Debug)]
pub struct SplitEvent {
    pub removed: EdgeID,
    pub removed_sym: EdgeID,
    pub replacements: [(EdgeID, EdgeID); 2],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanarGraph {
    pub nodes: IndexMap<NodeID, Node>,
    pub edges: IndexMap<EdgeID, Edge>,
    edge_id_counter: usize,
}

impl PlanarGraph {
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            edge_id_counter: 0,
        }
    }

    fn next_edge_id(&mut self) -> EdgeID {
        let id = EdgeID(self.edge_id_counter);
        self.edge_id_counter += 1;
        id
    }

    /// A structural deep copy. Ids are derived from geometry, so they stay valid across copies.
    pub fn copy(&self) -> PlanarGraph {
        self.clone()
    }

    pub fn edge_points(&self, edge: &Edge) -> (Coord, Coord) {
        (self.nodes[&edge.from].point, self.nodes[&edge.to].point)
    }

    pub fn edge_line(&self, id: EdgeID) -> Line {
        let edge = &self.edges[&id];
        let (a, b) = self.edge_points(edge);
        Line::new(a, b)
    }

    /// Number of physical edges incident to this node.
    pub fn degree(&self, n: &NodeID) -> usize {
        self.nodes[n].outer.len()
    }

    /// The node for this point, deduplicating within `EPSILON` of existing nodes.
    pub fn node_at(&mut self, pt: Coord) -> NodeID {
        if let Some(id) = self.find_nearest_node(pt, EPSILON) {
            return id;
        }
        let id = NodeID::for_point(pt);
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                point: pt,
                outer: Vec::new(),
                inner: Vec::new(),
            },
        );
        id
    }

    /// Brute-force search; doesn't use a quadtree. Ties go to the first node encountered.
    pub fn find_nearest_node(&self, pt: Coord, threshold: f64) -> Option<NodeID> {
        let mut best: Option<(NodeID, f64)> = None;
        for (id, node) in &self.nodes {
            let d = geometry::dist(node.point, pt);
            if d <= threshold && best.as_ref().map_or(true, |(_, bd)| d < *bd) {
                best = Some((id.clone(), d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Closest point on any edge within `threshold`, with ties going to the first edge
    /// encountered in insertion order.
    pub fn find_nearest_point_on_edge(&self, pt: Coord, threshold: f64) -> Option<(EdgeID, Coord)> {
        let mut best: Option<(EdgeID, Coord, f64)> = None;
        for (id, edge) in &self.edges {
            if !edge.is_canonical() {
                continue;
            }
            let (a, b) = self.edge_points(edge);
            let c = geometry::closest_point_on_segment(pt, a, b);
            let d = geometry::dist(pt, c);
            if d <= threshold && best.as_ref().map_or(true, |(_, _, bd)| d < *bd) {
                best = Some((*id, c, d));
            }
        }
        best.map(|(id, c, _)| (id, c))
    }

    /// Directionless existence check by endpoint identity.
    pub fn has_edge_between(&self, a: &NodeID, b: &NodeID) -> bool {
        self.nodes
            .get(a)
            .map_or(false, |node| node.outer.iter().any(|e| &self.edges[e].to == b))
    }

    /// Creates a symmetric edge pair between two nodes, returning the canonical id. No-op when
    /// the edge already exists or the endpoints coincide.
    pub fn add_edge_pair(&mut self, a: &NodeID, b: &NodeID) -> Option<EdgeID> {
        if a == b || self.has_edge_between(a, b) {
            return None;
        }
        let e1 = self.next_edge_id();
        let e2 = self.next_edge_id();
        self.edges.insert(
            e1,
            Edge {
                id: e1,
                from: a.clone(),
                to: b.clone(),
                sym: e2,
            },
        );
        self.edges.insert(
            e2,
            Edge {
                id: e2,
                from: b.clone(),
                to: a.clone(),
                sym: e1,
            },
        );
        self.nodes.get_mut(a).unwrap().outer.push(e1);
        self.nodes.get_mut(b).unwrap().inner.push(e1);
        self.nodes.get_mut(b).unwrap().outer.push(e2);
        self.nodes.get_mut(a).unwrap().inner.push(e2);
        self.sort_outer(a);
        self.sort_outer(b);
        Some(e1)
    }

    /// Removes an edge and its symmetric partner. Accepts either id of the pair. Endpoint nodes
    /// stay, even when left isolated.
    pub fn remove_edge_pair(&mut self, id: EdgeID) -> Option<(Edge, Edge)> {
        let edge = self.edges.shift_remove(&id)?;
        let sym = self.edges.shift_remove(&edge.sym).unwrap();
        for e in [&edge, &sym] {
            self.nodes.get_mut(&e.from).unwrap().outer.retain(|x| *x != e.id);
            self.nodes.get_mut(&e.to).unwrap().inner.retain(|x| *x != e.id);
        }
        Some((edge, sym))
    }

    /// Removes a node and every edge pair incident to it.
    pub fn remove_node(&mut self, n: &NodeID) {
        let outgoing: Vec<EdgeID> = match self.nodes.get(n) {
            Some(node) => node.outer.clone(),
            None => return,
        };
        for e in outgoing {
            self.remove_edge_pair(e);
        }
        self.nodes.shift_remove(n);
    }

    // Restore the invariant that a node's outgoing edges are ordered counter-clockwise. The sort
    // is stable, so colinear edges keep their insertion order.
    fn sort_outer(&mut self, n: &NodeID) {
        let origin = self.nodes[n].point;
        let mut keyed: Vec<(f64, EdgeID)> = self.nodes[n]
            .outer
            .iter()
            .map(|e| {
                let to = self.nodes[&self.edges[e].to].point;
                ((to.y - origin.y).atan2(to.x - origin.x), *e)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        self.nodes.get_mut(n).unwrap().outer = keyed.into_iter().map(|(_, e)| e).collect();
    }

    /// Inserts a polyline, splitting both the new segments and any existing edges they cross.
    /// `point_snap` optionally enables pulling individual input points onto the nearest existing
    /// edge within `SNAP_TOLERANCE`.
    pub fn insert_line_string(
        &mut self,
        points: &[Coord],
        point_snap: Option<&[bool]>,
    ) -> InsertEffects {
        let mut effects = InsertEffects::default();
        if points.len() < 2 {
            return effects;
        }
        let mut pts: Vec<Coord> = points.to_vec();
        for (i, pt) in pts.iter_mut().enumerate() {
            let snap = point_snap.map_or(false, |flags| flags.get(i).copied().unwrap_or(false));
            if !snap {
                continue;
            }
            if let Some((eid, c)) = self.find_nearest_point_on_edge(*pt, SNAP_TOLERANCE) {
                let (a, b) = self.edge_points(&self.edges[&eid]);
                // Only snap onto the interior of the edge; endpoints are handled by node dedup.
                if !geometry::pts_equal(c, a) && !geometry::pts_equal(c, b) {
                    *pt = c;
                }
            }
        }
        for pair in pts.windows(2) {
            self.insert_segment(pair[0], pair[1], &mut effects);
        }
        effects
    }

    fn insert_segment(&mut self, p: Coord, q: Coord, effects: &mut InsertEffects) {
        if geometry::pts_equal(p, q) {
            return;
        }
        // Gather crossings with existing edges. Crossings strictly inside an existing edge split
        // it; crossings at its endpoints just become chain points and dedup onto the node.
        let mut hits: Vec<(Coord, Option<EdgeID>)> = Vec::new();
        for (id, edge) in &self.edges {
            if !edge.is_canonical() {
                continue;
            }
            let (a, b) = self.edge_points(edge);
            let same_fwd = geometry::pts_equal(a, p) && geometry::pts_equal(b, q);
            let same_rev = geometry::pts_equal(a, q) && geometry::pts_equal(b, p);
            if same_fwd || same_rev {
                continue;
            }
            if let Some(x) = geometry::segment_intersection(p, q, a, b) {
                let interior = !geometry::pts_equal(x, a) && !geometry::pts_equal(x, b);
                hits.push((x, if interior { Some(*id) } else { None }));
            }
        }

        let mut split_points: Vec<(Coord, Option<EdgeID>)> = vec![(p, None)];
        for hit in hits {
            merge_split_point(&mut split_points, hit);
        }
        merge_split_point(&mut split_points, (q, None));
        split_points.sort_by(|a, b| {
            geometry::dist(p, a.0)
                .partial_cmp(&geometry::dist(p, b.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for (pt, split) in &split_points {
            if let Some(eid) = split {
                self.split_edge(*eid, *pt, effects);
            }
        }

        let mut prev: Option<NodeID> = None;
        for (pt, _) in &split_points {
            let nid = self.node_at(*pt);
            if let Some(prev_id) = prev {
                if prev_id != nid {
                    if let Some(e) = self.add_edge_pair(&prev_id, &nid) {
                        effects.added.push(e);
                    }
                }
            }
            prev = Some(nid);
        }
    }

    fn split_edge(&mut self, id: EdgeID, at: Coord, effects: &mut InsertEffects) {
        let Some((edge, sym)) = self.remove_edge_pair(id) else {
            return;
        };
        let x = self.node_at(at);
        let r1 = self.add_edge_pair(&edge.from, &x);
        let r2 = self.add_edge_pair(&x, &edge.to);
        match (r1, r2) {
            (Some(r1), Some(r2)) => {
                effects.splits.push(SplitEvent {
                    removed: edge.id,
                    removed_sym: sym.id,
                    replacements: [(r1, self.edges[&r1].sym), (r2, self.edges[&r2].sym)],
                });
            }
            _ => {
                warn!(
                    "Degenerate split of {} at ({}, {}); replacement pair already present",
                    edge.id, at.x, at.y
                );
            }
        }
    }

    /// Floodfill partition of the nodes into connected components, in insertion order.
    pub fn connected_components(&self) -> Vec<Vec<NodeID>> {
        let mut unvisited: indexmap::IndexSet<NodeID> = self.nodes.keys().cloned().collect();
        let mut components = Vec::new();
        while let Some(start) = unvisited.first().cloned() {
            let mut queue = vec![start];
            let mut component = Vec::new();
            while let Some(id) = queue.pop() {
                if !unvisited.shift_remove(&id) {
                    continue;
                }
                for e in &self.nodes[&id].outer {
                    queue.push(self.edges[e].to.clone());
                }
                component.push(id);
            }
            components.push(component);
        }
        components
    }
}

fn merge_split_point(points: &mut Vec<(Coord, Option<EdgeID>)>, hit: (Coord, Option<EdgeID>)) {
    for existing in points.iter_mut() {
        if geometry::pts_equal(existing.0, hit.0) {
            // Same location; keep whichever record carries a pending split.
            if existing.1.is_none() {
                existing.1 = hit.1;
            }
            return;
        }
    }
    points.push(hit);
}
