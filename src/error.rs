//! Error types for instance loading, batching, and rollouts.

use rand_distr::NormalError;
use thiserror::Error;

use crate::algorithms::rl::DecodeMode;

/// A malformed instance record, detected at load time before any rollout.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Instance has no nodes")]
    EmptyInstance,

    #[error("Node {node} has {found} features, expected {expected}")]
    WrongFeatureArity {
        node: usize,
        expected: usize,
        found: usize,
    },

    #[error("Record is missing a budget")]
    MissingBudget,

    #[error("Budget must be non-negative, got {0}")]
    NegativeBudget(f64),

    #[error("Coverage matrix is not square: row {row} has {len} entries, expected {rows}")]
    NonSquareCover { rows: usize, row: usize, len: usize },

    #[error("Coverage matrix is {cover}x{cover} but the instance has {nodes} nodes")]
    CoverSizeMismatch { nodes: usize, cover: usize },

    #[error("Coverage entry ({row}, {col}) must be 0 or 1, got {value}")]
    NonBinaryCover { row: usize, col: usize, value: f64 },

    #[error("Node {node} has negative packet value {value}")]
    NegativePacket { node: usize, value: f64 },

    #[error("Non-finite value in {field}")]
    NonFiniteValue { field: &'static str },

    #[error("Tour index {index} is out of range for {nodes} nodes")]
    TourOutOfRange { index: usize, nodes: usize },

    #[error("Tour must start at the depot")]
    TourNotDepotRooted,

    #[error("Invalid radius distribution: {0}")]
    RadiusDistribution(#[from] NormalError),
}

/// Inconsistent shapes across the episodes of a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Batch contains no episodes")]
    EmptyBatch,

    #[error("Episode {episode} has {found} nodes, expected {expected}")]
    NodeCountMismatch {
        episode: usize,
        expected: usize,
        found: usize,
    },

    #[error("Expected {expected} {what}, got {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Top-level error for the routing engine.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("Invalid record on line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: ValidationError,
    },

    #[error("Malformed JSON on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Episode {episode}: action {action} is out of range for {nodes} nodes")]
    InvalidAction {
        episode: usize,
        action: usize,
        nodes: usize,
    },

    #[error("Episode {episode} is active but has no feasible action")]
    EmptyMask { episode: usize },

    #[error("{mode} decoding needs one demonstration tour per episode")]
    MissingDemonstrations { mode: DecodeMode },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_arity_display() {
        let e = ValidationError::WrongFeatureArity {
            node: 3,
            expected: 4,
            found: 2,
        };
        assert_eq!(e.to_string(), "Node 3 has 2 features, expected 4");
    }

    #[test]
    fn node_count_mismatch_display() {
        let e = ShapeError::NodeCountMismatch {
            episode: 1,
            expected: 5,
            found: 7,
        };
        assert_eq!(e.to_string(), "Episode 1 has 7 nodes, expected 5");
    }

    #[test]
    fn record_error_carries_line() {
        let e = RouterError::Record {
            line: 12,
            source: ValidationError::MissingBudget,
        };
        assert_eq!(
            e.to_string(),
            "Invalid record on line 12: Record is missing a budget"
        );
    }

    #[test]
    fn shape_error_converts() {
        let e: RouterError = ShapeError::EmptyBatch.into();
        assert!(matches!(e, RouterError::Shape(ShapeError::EmptyBatch)));
    }
}
