use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Width assigned to new logical streets, in meters. Blocks are inset by half of this.
    pub street_width: f64,
    /// How deep a lot may extend from the street it faces, in meters.
    pub max_lot_depth: f64,
    /// Spacing between lot-splitting rays along a strip's street edge, in meters.
    pub lot_width: f64,
    /// Slices producing a sub-polygon below this area (square meters) are rejected.
    pub min_lot_area: f64,
    /// World units per meter. All meter-denominated parameters convert through this before
    /// touching geometry.
    pub units_per_meter: f64,
    /// Seed for the color source, so generated layouts are reproducible.
    pub color_seed: u64,
}

impl PlanConfig {
    pub fn default() -> Self {
        Self {
            street_width: 10.0,
            max_lot_depth: 40.0,
            lot_width: 25.0,
            min_lot_area: 500.0,
            units_per_meter: 1.0,
            color_seed: 42,
        }
    }

    /// Converts meters to world units.
    pub fn meters(&self, m: f64) -> f64 {
        m * self.units_per_meter
    }

    /// Converts square meters to square world units.
    pub fn square_meters(&self, m2: f64) -> f64 {
        m2 * self.units_per_meter * self.units_per_meter
    }
}

/// An RGBA color, drawn uniformly at random for streets and lots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            r: rng.gen(),
            g: rng.gen(),
            b: rng.gen(),
            a: 255,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
