use itertools::Itertools;

use crate::geometry::{self, EPSILON};
use crate::StreetPlan;

impl StreetPlan {
    /// Validates various things are true about the plan, panicking if not.
    pub fn check_invariants(&self) {
        // Every edge has exactly one symmetric partner, matching in reverse, and its endpoints
        // list it.
        for edge in self.graph.edges.values() {
            let sym = self
                .graph
                .edges
                .get(&edge.sym)
                .unwrap_or_else(|| panic!("{} has no symmetric partner", edge.id));
            assert_eq!(sym.sym, edge.id, "{} and {} aren't mutual partners", edge.id, sym.id);
            assert_eq!(sym.from, edge.to, "{} reversed endpoints mismatch", edge.id);
            assert_eq!(sym.to, edge.from, "{} reversed endpoints mismatch", edge.id);

            let from = &self.graph.nodes[&edge.from];
            let to = &self.graph.nodes[&edge.to];
            assert!(
                from.outer.contains(&edge.id),
                "{} doesn't list {} as outgoing",
                from.id,
                edge.id
            );
            assert!(
                to.inner.contains(&edge.id),
                "{} doesn't list {} as incoming",
                to.id,
                edge.id
            );
        }

        // No two distinct nodes within the dedup tolerance, and node edge lists point back.
        let nodes: Vec<_> = self.graph.nodes.values().collect();
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                assert!(
                    geometry::dist(a.point, b.point) > EPSILON,
                    "{} and {} coincide",
                    a.id,
                    b.id
                );
            }
            for e in &a.outer {
                assert_eq!(
                    self.graph.edges[e].from, a.id,
                    "{} lists {} but it starts elsewhere",
                    a.id, e
                );
            }
            // At most one directed edge per ordered endpoint pair.
            let dupes = a
                .outer
                .iter()
                .map(|e| &self.graph.edges[e].to)
                .duplicates()
                .count();
            assert_eq!(dupes, 0, "{} has redundant parallel edges", a.id);
        }

        // Every edge belongs to exactly one street, and streets stay simple paths.
        for edge in self.graph.edges.values() {
            let owners = self
                .streets
                .values()
                .filter(|s| s.contains(edge.id))
                .count();
            assert_eq!(owners, 1, "{} belongs to {} streets", edge.id, owners);
        }
        for street in self.streets.values() {
            assert!(!street.is_empty(), "{} is empty but still listed", street.id);
            for node in self.graph.nodes.values() {
                let pairs = street.pairs_at(&node.id, &self.graph);
                assert!(
                    pairs <= 2,
                    "{} uses {} edge-pairs at {}",
                    street.id,
                    pairs,
                    node.id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{PlanConfig, StreetPlan};
    use geo::Coord;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn invariants_hold_through_inserts_splits_and_merges() {
        let mut plan = StreetPlan::new(PlanConfig::default());
        plan.check_invariants();

        plan.insert_line_string(&[c(0.0, 0.0), c(2.0, 0.0)], None).unwrap();
        plan.check_invariants();

        // Crossing split.
        plan.insert_line_string(&[c(1.0, -1.0), c(1.0, 1.0)], None).unwrap();
        plan.check_invariants();

        // Street merge across a gap.
        plan.insert_line_string(&[c(3.0, 0.0), c(4.0, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(2.0, 0.0), c(3.0, 0.0)], None).unwrap();
        plan.check_invariants();

        // A detached loop.
        plan.insert_line_string(
            &[c(0.0, 2.0), c(2.0, 2.0), c(2.0, 3.0), c(0.0, 3.0), c(0.0, 2.0)],
            None,
        )
        .unwrap();
        plan.check_invariants();
    }

    #[test]
    fn rejected_input_leaves_the_plan_untouched() {
        let mut plan = StreetPlan::new(PlanConfig::default());
        assert!(plan.insert_line_string(&[c(0.0, 0.0)], None).is_err());
        assert!(plan.insert_line_string(&[], None).is_err());
        assert_eq!(plan.graph.nodes.len(), 0);
        assert_eq!(plan.graph.edges.len(), 0);
        assert!(plan.streets.is_empty());
    }
}
