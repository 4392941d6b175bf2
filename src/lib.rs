#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use anyhow::Result;
use geo::Coord;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub use self::block::Block;
pub use self::graph::{Edge, InsertEffects, Node, PlanarGraph, SplitEvent, SNAP_TOLERANCE};
pub use self::ids::{EdgeID, NodeID, StreetID};
pub use self::lot::Lot;
pub use self::output::to_json;
pub use self::ring::{polygonize, EdgeRing};
pub use self::street::{max_turn_for_degree, LogicalStreet};
pub use self::strip::Strip;
pub use self::types::{Color, PlanConfig};

mod block;
pub mod geometry;
mod graph;
mod ids;
mod lot;
mod output;
mod pathfinding;
mod ring;
mod street;
mod strip;
mod types;
mod utils;
mod validate;

/// The engine: a planar street graph, its grouping into logical streets, and the derivation of
/// blocks, strips and lots from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreetPlan {
    pub graph: PlanarGraph,
    pub streets: IndexMap<StreetID, LogicalStreet>,
    pub config: PlanConfig,

    street_id_counter: usize,
    #[serde(skip, default = "default_rng")]
    rng: StdRng,
}

fn default_rng() -> StdRng {
    StdRng::seed_from_u64(0)
}

/// A block together with everything derived from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockLayout {
    pub block: Block,
    pub strips: Vec<Strip>,
    pub lots: Vec<Lot>,
}

impl StreetPlan {
    pub fn new(config: PlanConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.color_seed);
        Self {
            graph: PlanarGraph::new(),
            streets: IndexMap::new(),
            config,
            street_id_counter: 0,
            rng,
        }
    }

    pub fn blank() -> Self {
        Self::new(PlanConfig::default())
    }

    /// Inserts a street centerline. Crossings with existing edges split both sides and every new
    /// edge lands in a logical street. `point_snap` optionally pulls individual input points onto
    /// the nearest existing edge. Returns the surviving new edges.
    pub fn insert_line_string(
        &mut self,
        points: &[Coord],
        point_snap: Option<&[bool]>,
    ) -> Result<Vec<EdgeID>> {
        if points.len() < 2 {
            bail!("rejected input: a line string needs at least two points");
        }
        let effects = self.graph.insert_line_string(points, point_snap);

        // Splits first: an edge that already belonged to a street hands its replacements to that
        // street, keeping continuity across the split. Orphan replacements queue for assignment.
        let mut queue: Vec<EdgeID> = effects.added.clone();
        for split in &effects.splits {
            let owner = self
                .streets
                .values()
                .find(|s| s.contains(split.removed) || s.contains(split.removed_sym))
                .map(|s| s.id);
            match owner {
                Some(sid) => {
                    let street = self.streets.get_mut(&sid).unwrap();
                    street.remove_pair(split.removed, split.removed_sym);
                    for (r, sym) in split.replacements {
                        street.add_pair(r, sym);
                    }
                }
                None => queue.extend(split.replacements.iter().map(|(r, _)| *r)),
            }
        }
        for e in &queue {
            self.assign_edge(*e);
        }

        Ok(effects
            .added
            .into_iter()
            .filter(|e| self.graph.edges.contains_key(e))
            .collect())
    }

    /// Removes an edge pair from the graph and from whichever street holds it. Emptied streets
    /// are deleted.
    pub fn remove_edge(&mut self, e: EdgeID) {
        let Some((edge, sym)) = self.graph.remove_edge_pair(e) else {
            return;
        };
        let mut emptied = None;
        for street in self.streets.values_mut() {
            if street.contains(edge.id) || street.contains(sym.id) {
                street.remove_pair(edge.id, sym.id);
                if street.is_empty() {
                    emptied = Some(street.id);
                }
                break;
            }
        }
        if let Some(sid) = emptied {
            debug!("Deleting emptied {}", sid);
            self.streets.shift_remove(&sid);
        }
    }

    /// Runs the whole pipeline on the current graph: blocks, strips per block, lots per strip.
    /// Lot ordinals run per street across all blocks.
    pub fn generate(&mut self) -> Vec<BlockLayout> {
        let blocks = self.blocks();
        let mut lot_counters: IndexMap<StreetID, usize> = IndexMap::new();
        let mut layouts = Vec::new();
        for block in blocks {
            let strips = self.strips_for_block(&block);
            let mut lots = Vec::new();
            for strip in &strips {
                let start = lot_counters.get(&strip.street).copied().unwrap_or(0);
                let strip_lots = self.lots_for_strip(strip, &block, start);
                lot_counters.insert(strip.street, start + strip_lots.len());
                lots.extend(strip_lots);
            }
            layouts.push(BlockLayout {
                block,
                strips,
                lots,
            });
        }
        layouts
    }
}
