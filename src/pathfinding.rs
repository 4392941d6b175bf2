use petgraph::graphmap::DiGraphMap;

use crate::geometry;
use crate::ids::NodeID;
use crate::StreetPlan;

// The planar graph supports richer queries than the layout pipeline needs. This is a
// deliberately simple subset of pathfinding for now.

impl StreetPlan {
    /// Calculates a rough travel distance between two graph nodes along edges.
    pub fn path_dist_to(&self, from: &NodeID, to: &NodeID) -> Option<f64> {
        let graph = self.distance_graph();
        let a = self.graph.nodes.get_index_of(from)?;
        let b = self.graph.nodes.get_index_of(to)?;
        petgraph::algo::dijkstra(&graph, a, Some(b), |(_, _, w)| *w)
            .get(&b)
            .cloned()
    }

    /// Calculates a shortest node-to-node path, as the sequence of nodes crossed.
    pub fn simple_path(&self, from: &NodeID, to: &NodeID) -> Option<Vec<NodeID>> {
        let graph = self.distance_graph();
        let a = self.graph.nodes.get_index_of(from)?;
        let b = self.graph.nodes.get_index_of(to)?;
        let (_, path) = petgraph::algo::astar(&graph, a, |n| n == b, |(_, _, w)| *w, |_| 0.0)?;
        Some(
            path.into_iter()
                .map(|i| self.graph.nodes.get_index(i).unwrap().0.clone())
                .collect(),
        )
    }

    fn distance_graph(&self) -> DiGraphMap<usize, f64> {
        let mut graph = DiGraphMap::new();
        for edge in self.graph.edges.values() {
            if !edge.is_canonical() {
                continue;
            }
            let (p1, p2) = self.graph.edge_points(edge);
            let a = self.graph.nodes.get_index_of(&edge.from).unwrap();
            let b = self.graph.nodes.get_index_of(&edge.to).unwrap();
            let dist = geometry::dist(p1, p2);
            graph.add_edge(a, b, dist);
            graph.add_edge(b, a, dist);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlanConfig;
    use approx::assert_relative_eq;
    use geo::Coord;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn distances_follow_the_graph_not_the_crow() {
        let mut plan = StreetPlan::new(PlanConfig::default());
        plan.insert_line_string(&[c(0.0, 0.0), c(1.0, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(1.0, 0.0), c(1.0, 1.0)], None).unwrap();
        let a = plan.graph.find_nearest_node(c(0.0, 0.0), 1e-9).unwrap();
        let b = plan.graph.find_nearest_node(c(1.0, 1.0), 1e-9).unwrap();
        assert_relative_eq!(plan.path_dist_to(&a, &b).unwrap(), 2.0);

        let path = plan.simple_path(&a, &b).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], a);
        assert_eq!(path[2], b);
    }

    #[test]
    fn disconnected_nodes_have_no_path() {
        let mut plan = StreetPlan::new(PlanConfig::default());
        plan.insert_line_string(&[c(0.0, 0.0), c(1.0, 0.0)], None).unwrap();
        plan.insert_line_string(&[c(5.0, 0.0), c(6.0, 0.0)], None).unwrap();
        let a = plan.graph.find_nearest_node(c(0.0, 0.0), 1e-9).unwrap();
        let b = plan.graph.find_nearest_node(c(6.0, 0.0), 1e-9).unwrap();
        assert!(plan.path_dist_to(&a, &b).is_none());
        assert!(plan.simple_path(&a, &b).is_none());
    }
}
