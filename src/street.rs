use std::cell::RefCell;
use std::f64::consts::PI;

use geo::{Coord, EuclideanLength, LineString};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::geometry;
use crate::graph::PlanarGraph;
use crate::ids::{EdgeID, NodeID, StreetID};
use crate::types::Color;
use crate::StreetPlan;

/// Widest turn allowed through a node of degree 2 or less.
pub const MAX_TURN_DEGREE_2: f64 = PI / 3.0;
/// Widest turn allowed through a node of degree 3.
pub const MAX_TURN_DEGREE_3: f64 = PI / 4.0;
/// Widest turn allowed through a node of degree 4 or more.
pub const MAX_TURN_DEGREE_4: f64 = PI / 6.0;

pub fn max_turn_for_degree(degree: usize) -> f64 {
    match degree {
        0..=2 => MAX_TURN_DEGREE_2,
        3 => MAX_TURN_DEGREE_3,
        _ => MAX_TURN_DEGREE_4,
    }
}

/// A maximal low-deflection path through the graph: an identified set of edges, always in
/// symmetric pairs, threading straight-ish through every intersection it crosses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogicalStreet {
    pub id: StreetID,
    pub name: Option<String>,
    pub color: Color,
    /// Width in meters.
    pub width: f64,
    /// Both directions of every member pair, in insertion order.
    pub edges: IndexSet<EdgeID>,
    #[serde(skip)]
    cached_linestring: RefCell<Option<LineString>>,
}

impl LogicalStreet {
    pub fn new(id: StreetID, color: Color, width: f64) -> Self {
        Self {
            id,
            name: None,
            color,
            width,
            edges: IndexSet::new(),
            cached_linestring: RefCell::new(None),
        }
    }

    pub fn add_pair(&mut self, e: EdgeID, sym: EdgeID) {
        self.edges.insert(e);
        self.edges.insert(sym);
        self.invalidate();
    }

    pub fn remove_pair(&mut self, e: EdgeID, sym: EdgeID) {
        self.edges.shift_remove(&e);
        self.edges.shift_remove(&sym);
        self.invalidate();
    }

    pub fn contains(&self, e: EdgeID) -> bool {
        self.edges.contains(&e)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    fn invalidate(&self) {
        *self.cached_linestring.borrow_mut() = None;
    }

    /// How many of this street's edge pairs touch `n` as an endpoint. The simple-path invariant
    /// caps this at two.
    pub fn pairs_at(&self, n: &NodeID, graph: &PlanarGraph) -> usize {
        self.edges
            .iter()
            .filter_map(|e| graph.edges.get(e))
            .filter(|e| &e.from == n)
            .count()
    }

    /// Member edge pairs, visiting each physical edge once.
    pub fn physical_edges<'a>(
        &'a self,
        graph: &'a PlanarGraph,
    ) -> impl Iterator<Item = &'a crate::graph::Edge> + 'a {
        self.edges
            .iter()
            .filter_map(|e| graph.edges.get(e))
            .filter(|e| e.is_canonical())
    }

    /// The street's derived centerline: its edges ordered into a path. Cached until membership
    /// changes.
    pub fn linestring(&self, graph: &PlanarGraph) -> LineString {
        if let Some(cached) = self.cached_linestring.borrow().as_ref() {
            return cached.clone();
        }
        let derived = self.derive_linestring(graph);
        *self.cached_linestring.borrow_mut() = Some(derived.clone());
        derived
    }

    pub fn length(&self, graph: &PlanarGraph) -> f64 {
        self.linestring(graph).euclidean_length()
    }

    fn derive_linestring(&self, graph: &PlanarGraph) -> LineString {
        let mut remaining: Vec<(NodeID, NodeID)> = self
            .physical_edges(graph)
            .map(|e| (e.from.clone(), e.to.clone()))
            .collect();
        if remaining.is_empty() {
            return LineString::new(Vec::new());
        }
        // Start from a path endpoint when there is one; a street forming a closed loop starts
        // anywhere.
        let start_idx = remaining
            .iter()
            .position(|(a, b)| {
                let ends = |n: &NodeID| {
                    remaining
                        .iter()
                        .filter(|(x, y)| x == n || y == n)
                        .count()
                        == 1
                };
                ends(a) || ends(b)
            })
            .unwrap_or(0);
        let (mut a, mut b) = remaining.swap_remove(start_idx);
        let incident = |n: &NodeID, list: &[(NodeID, NodeID)]| {
            list.iter().filter(|(x, y)| x == n || y == n).count()
        };
        if incident(&b, &remaining) == 0 && incident(&a, &remaining) > 0 {
            std::mem::swap(&mut a, &mut b);
        }
        let mut chain: Vec<NodeID> = vec![a, b];
        loop {
            let tail = chain.last().unwrap().clone();
            let Some(idx) = remaining.iter().position(|(x, y)| x == &tail || y == &tail) else {
                break;
            };
            let (x, y) = remaining.swap_remove(idx);
            chain.push(if x == tail { y } else { x });
        }
        LineString::new(
            chain
                .into_iter()
                .map(|n| graph.nodes[&n].point)
                .collect(),
        )
    }
}

impl StreetPlan {
    pub fn find_street_for_edge(&self, e: EdgeID) -> Option<StreetID> {
        self.streets
            .values()
            .find(|s| s.contains(e))
            .map(|s| s.id)
    }

    /// Street lookup by edge endpoints in either direction.
    pub fn find_street_for_endpoints(&self, a: &NodeID, b: &NodeID) -> Option<StreetID> {
        let node = self.graph.nodes.get(a)?;
        let e = node
            .outer
            .iter()
            .find(|e| &self.graph.edges[*e].to == b)?;
        self.find_street_for_edge(*e)
    }

    /// The street best continued by `e` through `at`: the assigned edge with the smallest turn
    /// angle, subject to the degree-based cap and the simple-path invariant.
    fn continuation_candidate(&self, e: EdgeID, at: &NodeID) -> Option<StreetID> {
        let edge = &self.graph.edges[&e];
        let node = &self.graph.nodes[at];
        let max_turn = max_turn_for_degree(node.outer.len());
        let at_pt = node.point;
        let new_other = self.graph.nodes[edge.other_endpoint(at)].point;
        let vec_new = Coord {
            x: new_other.x - at_pt.x,
            y: new_other.y - at_pt.y,
        };

        let mut best: Option<(StreetID, f64)> = None;
        for oe in &node.outer {
            if *oe == e || *oe == edge.sym {
                continue;
            }
            let Some(sid) = self.find_street_for_edge(*oe) else {
                continue;
            };
            let other_pt = self.graph.nodes[&self.graph.edges[oe].to].point;
            // How straight the path through the node would be: the angle between arriving from
            // the existing edge and leaving along the new one.
            let vec_existing = Coord {
                x: at_pt.x - other_pt.x,
                y: at_pt.y - other_pt.y,
            };
            let turn = geometry::angle_between(vec_existing, vec_new);
            if turn >= max_turn {
                continue;
            }
            if self.streets[&sid].pairs_at(at, &self.graph) >= 2 {
                continue;
            }
            if best.map_or(true, |(_, bt)| turn < bt) {
                best = Some((sid, turn));
            }
        }
        best.map(|(sid, _)| sid)
    }

    /// Puts a freshly added edge into a logical street: continuing one, bridging two, or
    /// starting its own.
    pub(crate) fn assign_edge(&mut self, e: EdgeID) {
        let Some(edge) = self.graph.edges.get(&e) else {
            return;
        };
        if self.find_street_for_edge(e).is_some() {
            return;
        }
        let (from, to, sym) = (edge.from.clone(), edge.to.clone(), edge.sym);
        let cand_u = self.continuation_candidate(e, &from);
        let cand_v = self.continuation_candidate(e, &to);
        let sid = match (cand_u, cand_v) {
            (None, None) => self.new_street(),
            (Some(s), None) | (None, Some(s)) => s,
            (Some(s1), Some(s2)) if s1 == s2 => s1,
            (Some(s1), Some(s2)) => {
                self.merge_streets(s1, s2);
                s1
            }
        };
        self.streets.get_mut(&sid).unwrap().add_pair(e, sym);
    }

    pub(crate) fn new_street(&mut self) -> StreetID {
        let id = StreetID(self.street_id_counter);
        self.street_id_counter += 1;
        let color = Color::random(&mut self.rng);
        let width = self.config.street_width;
        self.streets
            .insert(id, LogicalStreet::new(id, color, width));
        id
    }

    /// Moves every edge of `from` into `into` and deletes `from`.
    pub(crate) fn merge_streets(&mut self, into: StreetID, from: StreetID) {
        if into == from {
            return;
        }
        let Some(absorbed) = self.streets.shift_remove(&from) else {
            return;
        };
        debug!("Merging {} into {}", from, into);
        let target = self.streets.get_mut(&into).unwrap();
        for e in absorbed.edges {
            target.edges.insert(e);
        }
        target.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlanConfig;
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    fn plan() -> StreetPlan {
        StreetPlan::new(PlanConfig::default())
    }

    #[test]
    fn straight_continuation_joins_the_same_street() {
        let mut plan = plan();
        plan.insert_line_string(&[c(0.0, 0.0), c(1.0, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(1.0, 0.0), c(2.0, 0.0)], None).unwrap();
        assert_eq!(plan.streets.len(), 1);
    }

    #[test]
    fn t_junction_keeps_the_stub_separate() {
        let mut plan = plan();
        plan.insert_line_string(&[c(0.0, 0.0), c(1.0, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(1.0, 0.0), c(2.0, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(1.0, 0.0), c(1.0, 1.0)], None).unwrap();

        assert_eq!(plan.streets.len(), 2);
        let mut sizes: Vec<usize> = plan.streets.values().map(|s| s.edges.len()).collect();
        sizes.sort();
        // The horizontal street keeps both pairs; the stub is one pair on its own.
        assert_eq!(sizes, vec![2, 4]);
    }

    #[test]
    fn a_gap_edge_merges_two_streets() {
        let mut plan = plan();
        plan.insert_line_string(&[c(0.0, 0.0), c(1.0, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(2.0, 0.0), c(3.0, 0.0)], None).unwrap();
        assert_eq!(plan.streets.len(), 2);
        plan.insert_line_string(&[c(1.0, 0.0), c(2.0, 0.0)], None).unwrap();
        assert_eq!(plan.streets.len(), 1);
        assert_eq!(plan.streets.values().next().unwrap().edges.len(), 6);
    }

    #[test]
    fn sharp_turns_start_a_new_street() {
        let mut plan = plan();
        plan.insert_line_string(&[c(0.0, 0.0), c(1.0, 0.0)], None).unwrap();
        // 90 degrees exceeds every cap.
        plan.insert_line_string(&[c(1.0, 0.0), c(1.0, 1.0)], None).unwrap();
        assert_eq!(plan.streets.len(), 2);
    }

    #[test]
    fn gentle_turns_continue_at_low_degree() {
        let mut plan = plan();
        plan.insert_line_string(&[c(0.0, 0.0), c(1.0, 0.0)], None).unwrap();
        // 45 degrees: allowed through a degree-2 node (cap 60), too wide at degree 3 (cap 45).
        plan.insert_line_string(&[c(1.0, 0.0), c(2.0, 1.0)], None).unwrap();
        assert_eq!(plan.streets.len(), 1);
        plan.insert_line_string(&[c(1.0, 0.0), c(1.0, -1.0)], None).unwrap();
        assert_eq!(plan.streets.len(), 2);
    }

    #[test]
    fn splits_preserve_street_identity() {
        let mut plan = plan();
        plan.insert_line_string(&[c(0.0, 0.0), c(2.0, 0.0)], None).unwrap();
        let horizontal = *plan.streets.keys().next().unwrap();
        plan.insert_line_string(&[c(1.0, -1.0), c(1.0, 1.0)], None).unwrap();

        // The horizontal edge was split in two; both halves still belong to the original street.
        let street = &plan.streets[&horizontal];
        assert_eq!(street.edges.len(), 4);
        let ls = street.linestring(&plan.graph);
        assert_eq!(ls.0.len(), 3);
        assert!(geometry::pts_equal(ls.0[0], c(0.0, 0.0)) || geometry::pts_equal(ls.0[0], c(2.0, 0.0)));
    }

    #[test]
    fn cached_linestring_reflects_membership_changes() {
        let mut plan = plan();
        plan.insert_line_string(&[c(0.0, 0.0), c(1.0, 0.0)], None).unwrap();
        let sid = *plan.streets.keys().next().unwrap();
        assert_eq!(plan.streets[&sid].linestring(&plan.graph).0.len(), 2);
        plan.insert_line_string(&[c(1.0, 0.0), c(2.0, 0.0)], None).unwrap();
        let ls = plan.streets[&sid].linestring(&plan.graph);
        assert_eq!(ls.0.len(), 3);
        assert_relative_eq!(plan.streets[&sid].length(&plan.graph), 2.0);
    }
}
