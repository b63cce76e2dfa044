//! Batched BCCSP environment.
//!
//! Holds one [`EpisodeState`] per instance and advances all of them in
//! lock-step: compute masks and gains, let the caller choose actions, then
//! [`RoutingEnvironment::step`].

use log::trace;

use super::config::RLConfig;
use super::episode::EpisodeState;
use super::observation::{Observation, StateSnapshot};
use super::types::ActionMask;
use crate::error::{RouterError, ShapeError};
use crate::instance::batch::check_uniform;
use crate::instance::{Instance, DEPOT};

/// Result of a single batched step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Per-episode snapshots after the step.
    pub states: Vec<StateSnapshot>,
    /// Per-episode `active` flags after the step.
    pub active: Vec<bool>,
    /// Distance travelled by each episode this step (0 for terminated ones).
    pub distances: Vec<f64>,
    /// Whether every episode has terminated.
    pub done: bool,
}

/// Lock-step environment over a batch of instances with a uniform node count.
///
/// # Lifecycle
///
/// 1. [`RoutingEnvironment::new`] resets every episode with its instance budget.
/// 2. [`RoutingEnvironment::reset`] re-initializes with explicit budgets.
/// 3. Query [`feasible_mask`](Self::feasible_mask) and
///    [`marginal_gain`](Self::marginal_gain), then call
///    [`step`](Self::step) with one action per episode until all terminate.
#[derive(Debug, Clone)]
pub struct RoutingEnvironment<'a> {
    /// Environment configuration.
    pub config: RLConfig,
    instances: &'a [Instance],
    episodes: Vec<EpisodeState>,
    n_nodes: usize,
}

impl<'a> RoutingEnvironment<'a> {
    /// Creates an environment over `instances`, reset with each instance's own budget.
    ///
    /// # Errors
    ///
    /// [`ShapeError`] when the batch is empty or node counts differ.
    pub fn new(instances: &'a [Instance], config: RLConfig) -> Result<Self, ShapeError> {
        let n_nodes = check_uniform(instances)?;
        let episodes = instances
            .iter()
            .map(|inst| EpisodeState::start(inst, inst.budget()))
            .collect();
        Ok(Self {
            config,
            instances,
            episodes,
            n_nodes,
        })
    }

    /// Starts new episodes with the given budgets: depot visited and covered,
    /// zero tour length, full remaining budget.
    pub fn reset(&mut self, budgets: &[f64]) -> Result<Vec<StateSnapshot>, ShapeError> {
        if budgets.len() != self.instances.len() {
            return Err(ShapeError::LengthMismatch {
                what: "budgets",
                expected: self.instances.len(),
                found: budgets.len(),
            });
        }
        self.episodes = self
            .instances
            .iter()
            .zip(budgets)
            .map(|(inst, &b)| EpisodeState::start(inst, b.max(0.0)))
            .collect();
        Ok(self.state())
    }

    /// Feasibility of every node for one episode.
    ///
    /// A node is feasible iff it is unvisited and the detour through it back to
    /// the depot fits the remaining budget. The depot (stop/return) is feasible
    /// iff the direct return fits, regardless of it being visited. Both tests
    /// allow `budget_epsilon` of slack so rounding in the budget bookkeeping
    /// cannot rule out a return that was affordable one step earlier.
    pub fn feasible_mask_for(&self, episode: usize) -> ActionMask {
        let inst = &self.instances[episode];
        let state = &self.episodes[episode];
        let remaining = state.remaining_budget() + self.config.budget_epsilon;
        let from_current = inst.distance_row(state.current_node());
        let mut mask: ActionMask = (0..self.n_nodes)
            .map(|i| {
                !state.is_visited(i) && from_current[i] + inst.distance(i, DEPOT) <= remaining
            })
            .collect();
        mask[DEPOT] = from_current[DEPOT] <= remaining;
        mask
    }

    /// Feasibility masks for the whole batch.
    pub fn feasible_mask(&self) -> Vec<ActionMask> {
        (0..self.episodes.len())
            .map(|e| self.feasible_mask_for(e))
            .collect()
    }

    /// Packet value newly covered if each node were visited next.
    ///
    /// The depot always has zero gain; it is a pure termination action.
    pub fn marginal_gain_for(&self, episode: usize) -> Vec<f64> {
        let inst = &self.instances[episode];
        let state = &self.episodes[episode];
        let mut gains: Vec<f64> = (0..self.n_nodes)
            .map(|i| {
                (0..self.n_nodes)
                    .filter(|&j| !state.is_covered(j) && inst.covers(i, j))
                    .map(|j| inst.packet(j))
                    .sum()
            })
            .collect();
        gains[DEPOT] = 0.0;
        gains
    }

    /// Marginal gains for the whole batch.
    pub fn marginal_gain(&self) -> Vec<Vec<f64>> {
        (0..self.episodes.len())
            .map(|e| self.marginal_gain_for(e))
            .collect()
    }

    /// Applies one action per episode.
    ///
    /// Active episodes pay `distance(current, action)`, move, and absorb the
    /// action's coverage row; they terminate on returning to the depot or when
    /// the remaining budget drops below `budget_epsilon`. Actions for
    /// terminated episodes are ignored.
    ///
    /// # Errors
    ///
    /// [`ShapeError`] for a wrong action count, [`RouterError::InvalidAction`]
    /// for an out-of-range action on an active episode. No episode is mutated
    /// when an error is returned.
    pub fn step(&mut self, actions: &[usize]) -> Result<StepResult, RouterError> {
        if actions.len() != self.episodes.len() {
            return Err(ShapeError::LengthMismatch {
                what: "actions",
                expected: self.episodes.len(),
                found: actions.len(),
            }
            .into());
        }
        for (episode, (state, &action)) in self.episodes.iter().zip(actions).enumerate() {
            if state.is_active() && action >= self.n_nodes {
                return Err(RouterError::InvalidAction {
                    episode,
                    action,
                    nodes: self.n_nodes,
                });
            }
        }

        let eps = self.config.budget_epsilon;
        let distances: Vec<f64> = self
            .episodes
            .iter_mut()
            .zip(self.instances)
            .zip(actions)
            .map(|((state, inst), &action)| state.advance(inst, action, eps))
            .collect();
        trace!("step actions={:?} distances={:?}", actions, distances);

        let active: Vec<bool> = self.episodes.iter().map(EpisodeState::is_active).collect();
        let done = !active.iter().any(|&a| a);
        Ok(StepResult {
            states: self.state(),
            active,
            distances,
            done,
        })
    }

    /// Snapshots of every episode.
    pub fn state(&self) -> Vec<StateSnapshot> {
        self.episodes
            .iter()
            .map(|s| StateSnapshot::of(s, self.config.denom_epsilon))
            .collect()
    }

    /// Builds the policy view of every episode, optionally with marginal gains.
    pub fn observations(&self, with_gain: bool) -> Vec<Observation<'a>> {
        let instances: &'a [Instance] = self.instances;
        instances
            .iter()
            .zip(&self.episodes)
            .enumerate()
            .map(|(e, (inst, state))| Observation {
                nodes: inst.nodes(),
                distances_from_current: inst.distance_row(state.current_node()),
                distances_to_depot: inst.distance_row(DEPOT),
                dynamic: StateSnapshot::of(state, self.config.denom_epsilon).dynamic_features(),
                current_node: state.current_node(),
                remaining_budget: state.remaining_budget(),
                gain: with_gain.then(|| self.marginal_gain_for(e)),
                gain_epsilon: self.config.gain_normalizer_epsilon,
            })
            .collect()
    }

    pub fn instances(&self) -> &'a [Instance] {
        self.instances
    }

    pub fn episodes(&self) -> &[EpisodeState] {
        &self.episodes
    }

    pub fn episode(&self, index: usize) -> &EpisodeState {
        &self.episodes[index]
    }

    /// Number of episodes (B).
    pub fn batch_size(&self) -> usize {
        self.episodes.len()
    }

    /// Node count shared by every instance (N).
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    pub fn n_active(&self) -> usize {
        self.episodes.iter().filter(|s| s.is_active()).count()
    }

    pub fn all_terminated(&self) -> bool {
        self.n_active() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::rl::types::EpisodeStatus;
    use crate::instance::{NodeFeatures, Position};

    /// Depot + A + B with d(depot,A)=3, d(depot,B)=4, d(A,B)=5.
    fn triangle(budget: f64) -> Instance {
        Instance::from_points(&[(0.0, 0.0), (3.0, 0.0), (0.0, 4.0)], &[0.0, 5.0, 7.0], budget)
            .unwrap()
    }

    #[test]
    fn reset_initializes_episode() {
        let instances = vec![triangle(10.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let snaps = env.reset(&[8.0]).unwrap();
        assert_eq!(snaps.len(), 1);
        let s = env.episode(0);
        assert_eq!(s.current_node(), DEPOT);
        assert_eq!(s.remaining_budget(), 8.0);
        assert_eq!(s.tour_length(), 0.0);
        assert!(s.is_visited(DEPOT) && s.is_covered(DEPOT));
        assert!((snaps[0].remaining_fraction - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tight_two_hop_budget_keeps_return_feasible() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..2000 {
            let points: Vec<(f64, f64)> = (0..3).map(|_| (rng.gen(), rng.gen())).collect();
            let layout = Instance::from_points(&points, &[0.0, 1.0, 1.0], 0.0).unwrap();
            let budget = layout.distance(0, 1) + layout.distance(1, 2) + layout.distance(2, 0);
            let instances = vec![Instance::from_points(&points, &[0.0, 1.0, 1.0], budget).unwrap()];
            let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();

            assert!(env.feasible_mask_for(0)[1]);
            env.step(&[1]).unwrap();
            assert!(env.feasible_mask_for(0)[2]);
            env.step(&[2]).unwrap();
            if env.episode(0).is_active() {
                assert!(env.feasible_mask_for(0)[DEPOT]);
            }
        }
    }

    #[test]
    fn reset_rejects_wrong_budget_count() {
        let instances = vec![triangle(10.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        assert!(matches!(
            env.reset(&[1.0, 2.0]),
            Err(ShapeError::LengthMismatch { what: "budgets", .. })
        ));
    }

    #[test]
    fn triangle_feasibility_allows_one_detour() {
        let instances = vec![triangle(10.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        assert_eq!(env.feasible_mask_for(0), vec![true, true, true]);

        env.step(&[1]).unwrap();
        // At A with 7 left: B needs 5 + 4 = 9, depot needs 3.
        assert_eq!(env.feasible_mask_for(0), vec![true, false, false]);

        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        env.step(&[2]).unwrap();
        // At B with 6 left: A needs 5 + 3 = 8.
        assert_eq!(env.feasible_mask_for(0), vec![true, false, false]);
    }

    #[test]
    fn depot_feasible_even_though_visited() {
        let instances = vec![triangle(10.0)];
        let env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        assert!(env.episode(0).is_visited(DEPOT));
        assert!(env.feasible_mask_for(0)[DEPOT]);
    }

    #[test]
    fn zero_budget_only_allows_return() {
        let instances = vec![triangle(0.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        assert_eq!(env.feasible_mask_for(0), vec![true, false, false]);
        let result = env.step(&[DEPOT]).unwrap();
        assert!(result.done);
        assert_eq!(env.episode(0).tour_length(), 0.0);
        assert_eq!(env.episode(0).status(), EpisodeStatus::Terminated);
    }

    #[test]
    fn visiting_and_returning_covers_only_visited_node() {
        let instances = vec![triangle(10.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        env.step(&[1]).unwrap();
        let result = env.step(&[DEPOT]).unwrap();
        assert!(result.done);
        let s = env.episode(0);
        assert!((s.tour_length() - 6.0).abs() < 1e-12);
        assert!((s.remaining_budget() - 4.0).abs() < 1e-12);
        assert_eq!(s.covered_value(&instances[0]), 5.0);
        assert!(!s.is_covered(2));
    }

    #[test]
    fn radius_coverage_gain_and_propagation() {
        // Visiting node 1 covers both 1 and 2 (within its radius).
        let nodes = vec![
            NodeFeatures::new(Position::new(0.0, 0.0), 0.0, 0.0),
            NodeFeatures::new(Position::new(1.0, 0.0), 2.0, 0.5),
            NodeFeatures::new(Position::new(1.2, 0.0), 3.0, 0.0),
            NodeFeatures::new(Position::new(0.0, 3.0), 4.0, 0.0),
        ];
        let instances = vec![Instance::new(nodes, None, 10.0)
            .unwrap()
            .with_radius_coverage()];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();

        let gains = env.marginal_gain_for(0);
        assert_eq!(gains[DEPOT], 0.0);
        assert!((gains[1] - 5.0).abs() < 1e-12);
        assert!((gains[2] - 3.0).abs() < 1e-12);

        env.step(&[1]).unwrap();
        let s = env.episode(0);
        assert!(s.is_covered(1) && s.is_covered(2));
        assert!(!s.is_visited(2));
        assert_eq!(env.marginal_gain_for(0)[2], 0.0);
        assert_eq!(env.marginal_gain_for(0)[3], 4.0);
    }

    #[test]
    fn terminated_episodes_ignore_actions() {
        let instances = vec![triangle(10.0), triangle(10.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        env.step(&[DEPOT, 1]).unwrap();
        assert!(!env.episode(0).is_active());
        let r = env.step(&[2, DEPOT]).unwrap();
        assert_eq!(r.distances[0], 0.0);
        assert_eq!(env.episode(0).current_node(), DEPOT);
        assert!(r.done);
    }

    #[test]
    fn step_validates_actions() {
        let instances = vec![triangle(10.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        assert!(matches!(
            env.step(&[]),
            Err(RouterError::Shape(ShapeError::LengthMismatch { .. }))
        ));
        assert!(matches!(
            env.step(&[9]),
            Err(RouterError::InvalidAction { action: 9, .. })
        ));
        assert_eq!(env.episode(0).tour_length(), 0.0);
    }

    #[test]
    fn mixed_node_counts_are_rejected() {
        let small =
            Instance::from_points(&[(0.0, 0.0), (1.0, 0.0)], &[0.0, 1.0], 3.0).unwrap();
        let instances = vec![triangle(10.0), small];
        assert!(matches!(
            RoutingEnvironment::new(&instances, RLConfig::default()),
            Err(ShapeError::NodeCountMismatch { episode: 1, .. })
        ));
    }

    #[test]
    fn coverage_and_budget_are_monotone() {
        let instances = vec![triangle(20.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let mut prev = env.episode(0).clone();
        let mut moved = 0.0;
        for action in [1, 2, DEPOT] {
            let r = env.step(&[action]).unwrap();
            moved += r.distances[0];
            let s = env.episode(0);
            assert!(s.remaining_budget() <= prev.remaining_budget());
            assert!(s.tour_length() >= prev.tour_length());
            for j in 0..3 {
                assert!(!prev.is_covered(j) || s.is_covered(j));
            }
            prev = s.clone();
        }
        assert!((prev.tour_length() - moved).abs() < 1e-9);
        assert!((prev.tour_length() - 12.0).abs() < 1e-9);
    }
}
