use std::fmt;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::utils::{deserialize_usize, serialize_usize};

/// Stable node identity, derived from the node's coordinates. Two points within `EPSILON` of each
/// other resolve to the same `NodeID` at insertion time, so the string form is only minted once
/// per distinct location.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeID(pub String);

impl NodeID {
    pub fn for_point(pt: Coord) -> Self {
        NodeID(format!("{},{}", pt.x, pt.y))
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Opaque and non-contiguous
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeID(
    #[serde(
        serialize_with = "serialize_usize",
        deserialize_with = "deserialize_usize"
    )]
    pub usize,
);

impl fmt::Display for EdgeID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Edge #{}", self.0)
    }
}

/// Opaque and non-contiguous
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreetID(
    #[serde(
        serialize_with = "serialize_usize",
        deserialize_with = "deserialize_usize"
    )]
    pub usize,
);

impl StreetID {
    /// The stable string form used in output feature properties and lot ids.
    pub fn as_key(&self) -> String {
        format!("street-{}", self.0)
    }
}

impl fmt::Display for StreetID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Street #{}", self.0)
    }
}
