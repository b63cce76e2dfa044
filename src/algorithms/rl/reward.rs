//! Terminal reward for finished episodes.
//!
//! The reward trades covered demand against travel:
//! `coverage_weight × covered / total − tour_weight × tour_length / budget`,
//! with an epsilon in both denominators so empty instances and zero budgets
//! stay finite.

use super::config::{RLConfig, TrainingConfig};
use super::environment::RoutingEnvironment;
use super::episode::EpisodeState;
use super::rollout::Rollout;
use crate::instance::Instance;

/// Computes episode rewards.
pub struct RewardComputer;

impl RewardComputer {
    /// Covered packet value as a fraction of the instance total.
    pub fn coverage_ratio(state: &EpisodeState, instance: &Instance, eps: f64) -> f64 {
        state.covered_value(instance) / (instance.total_packets() + eps)
    }

    /// Reward of one terminal state.
    pub fn terminal(
        state: &EpisodeState,
        instance: &Instance,
        config: &TrainingConfig,
        eps: f64,
    ) -> f64 {
        let coverage = Self::coverage_ratio(state, instance, eps);
        let travel = state.tour_length() / (state.budget() + eps);
        config.coverage_weight * coverage - config.tour_weight * travel
    }

    /// Rewards of every episode in a rollout.
    pub fn for_rollout(
        rollout: &Rollout,
        instances: &[Instance],
        rl: &RLConfig,
        config: &TrainingConfig,
    ) -> Vec<f64> {
        rollout
            .final_states()
            .zip(instances)
            .map(|(state, inst)| Self::terminal(state, inst, config, rl.denom_epsilon))
            .collect()
    }

    /// Rewards of the environment's current episode states.
    pub fn for_environment(env: &RoutingEnvironment<'_>, config: &TrainingConfig) -> Vec<f64> {
        env.episodes()
            .iter()
            .zip(env.instances())
            .map(|(state, inst)| Self::terminal(state, inst, config, env.config.denom_epsilon))
            .collect()
    }
}
