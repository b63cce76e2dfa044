//! Geometric primitives and per-node features.

use std::fmt;

/// Number of features per node in a persisted record: `[x, y, packet_value, coverage_radius]`.
pub const NODE_FEATURE_DIM: usize = 4;

/// A 2D position, normally inside the unit square after normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Creates a new position.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Static description of one node, as seen by a scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeFeatures {
    pub position: Position,
    /// Demand collected when the node is covered.
    pub packet: f64,
    /// Coverage radius (0 when visiting equals collecting).
    pub radius: f64,
}

impl NodeFeatures {
    pub fn new(position: Position, packet: f64, radius: f64) -> Self {
        Self {
            position,
            packet,
            radius,
        }
    }

    /// Flat encoding `[x, y, packet, radius]`.
    pub fn as_array(&self) -> [f64; NODE_FEATURE_DIM] {
        [self.position.x, self.position.y, self.packet, self.radius]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn node_features_layout() {
        let f = NodeFeatures::new(Position::new(0.1, 0.2), 3.0, 0.15);
        assert_eq!(f.as_array(), [0.1, 0.2, 3.0, 0.15]);
    }
}
