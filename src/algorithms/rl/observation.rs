//! Read-only views of the environment handed to policies.

use super::episode::EpisodeState;
use super::types::EpisodeStatus;
use crate::instance::NodeFeatures;

/// Number of dynamic (per-step) context features.
pub const DYNAMIC_FEATURE_DIM: usize = 4;

/// Immutable snapshot of one episode, the only state a policy may observe.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub visited: Vec<bool>,
    pub covered: Vec<bool>,
    pub current_node: usize,
    /// `remaining_budget / budget`.
    pub remaining_fraction: f64,
    pub tour_length: f64,
    /// `tour_length / budget`.
    pub tour_fraction: f64,
    pub last_move_distance: f64,
    /// Fraction of nodes covered (by count).
    pub covered_fraction: f64,
    pub status: EpisodeStatus,
}

impl StateSnapshot {
    pub(crate) fn of(state: &EpisodeState, epsilon: f64) -> Self {
        Self {
            visited: state.visited().to_vec(),
            covered: state.covered().to_vec(),
            current_node: state.current_node(),
            remaining_fraction: state.remaining_fraction(epsilon),
            tour_length: state.tour_length(),
            tour_fraction: state.tour_fraction(epsilon),
            last_move_distance: state.last_move_distance(),
            covered_fraction: state.covered_fraction(),
            status: state.status(),
        }
    }

    /// `[remaining_fraction, last_move_distance, tour_fraction, covered_fraction]`.
    pub fn dynamic_features(&self) -> [f64; DYNAMIC_FEATURE_DIM] {
        [
            self.remaining_fraction,
            self.last_move_distance,
            self.tour_fraction,
            self.covered_fraction,
        ]
    }
}

/// Everything a policy sees for one episode at one tick.
#[derive(Debug, Clone)]
pub struct Observation<'a> {
    /// Static node features of the episode's instance.
    pub nodes: &'a [NodeFeatures],
    /// Precomputed distance row from the current node.
    pub distances_from_current: &'a [f64],
    /// Distances from every node back to the depot.
    pub distances_to_depot: &'a [f64],
    /// Dynamic context features, see [`StateSnapshot::dynamic_features`].
    pub dynamic: [f64; DYNAMIC_FEATURE_DIM],
    pub current_node: usize,
    /// Remaining budget in distance units.
    pub remaining_budget: f64,
    /// Marginal coverage gain per candidate node.
    pub gain: Option<Vec<f64>>,
    /// Added to the largest gain before normalizing by it.
    pub gain_epsilon: f64,
}

impl Observation<'_> {
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;

    #[test]
    fn snapshot_dynamic_features_layout() {
        let inst =
            Instance::from_points(&[(0.0, 0.0), (1.0, 0.0)], &[0.0, 1.0], 4.0).unwrap();
        let mut state = EpisodeState::start(&inst, 4.0);
        state.advance(&inst, 1, 1e-8);
        let snap = StateSnapshot::of(&state, 0.0);
        assert_eq!(snap.dynamic_features(), [0.75, 1.0, 0.25, 1.0]);
        assert_eq!(snap.current_node, 1);
        assert_eq!(snap.status, EpisodeStatus::Active);
    }
}
