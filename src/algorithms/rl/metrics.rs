//! Evaluation metrics over finished episodes.

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::config::{RLConfig, TrainingConfig};
use super::environment::RoutingEnvironment;
use super::policy::Policy;
use super::reward::RewardComputer;
use super::rollout::RolloutController;
use super::types::DecodeMode;
use crate::error::RouterError;
use crate::instance::Instance;

/// Aggregated evaluation metrics over a batch of episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationMetrics {
    /// Mean covered packet value per episode.
    pub mean_covered_value: f64,
    /// Mean covered value as a fraction of the instance total.
    pub mean_coverage_fraction: f64,
    /// Mean tour length.
    pub mean_tour_length: f64,
    /// Fraction of episodes that ended at the depot.
    pub return_rate: f64,
    /// Mean terminal reward.
    pub mean_reward: f64,
    /// Number of episodes evaluated.
    pub n_episodes: usize,
}

impl EvaluationMetrics {
    /// Summarizes the environment's current episode states.
    pub fn from_environment(env: &RoutingEnvironment<'_>, config: &TrainingConfig) -> Self {
        let eps = env.config.denom_epsilon;
        let n = env.batch_size().max(1) as f64;
        let mut covered = 0.0;
        let mut fraction = 0.0;
        let mut length = 0.0;
        let mut returned = 0usize;
        for (state, inst) in env.episodes().iter().zip(env.instances()) {
            covered += state.covered_value(inst);
            fraction += RewardComputer::coverage_ratio(state, inst, eps);
            length += state.tour_length();
            if state.at_depot() && state.n_moves() > 0 {
                returned += 1;
            }
        }
        let rewards = RewardComputer::for_environment(env, config);

        Self {
            mean_covered_value: covered / n,
            mean_coverage_fraction: fraction / n,
            mean_tour_length: length / n,
            return_rate: returned as f64 / n,
            mean_reward: rewards.iter().sum::<f64>() / n,
            n_episodes: env.batch_size(),
        }
    }

    /// Runs a greedy rollout of `policy` over `instances` and summarizes it.
    pub fn evaluate<P: Policy + ?Sized>(
        instances: &[Instance],
        policy: &mut P,
        rl: &RLConfig,
        config: &TrainingConfig,
    ) -> Result<Self, RouterError> {
        let mut env = RoutingEnvironment::new(instances, rl.clone())?;
        // greedy decoding never draws; the seed is irrelevant
        let mut rng = StdRng::seed_from_u64(0);
        RolloutController::new(DecodeMode::Greedy, rl.clone()).run(
            &mut env,
            policy,
            &mut rng,
            None,
        )?;
        Ok(Self::from_environment(&env, config))
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== Evaluation Metrics ({} episodes) ===",
            self.n_episodes
        )?;
        writeln!(
            f,
            "  Mean covered value:      {:.2}",
            self.mean_covered_value
        )?;
        writeln!(
            f,
            "  Mean coverage:           {:.1}%",
            self.mean_coverage_fraction * 100.0
        )?;
        writeln!(f, "  Mean tour length:        {:.3}", self.mean_tour_length)?;
        writeln!(f, "  Return rate:             {:.1}%", self.return_rate * 100.0)?;
        writeln!(f, "  Mean reward:             {:.3}", self.mean_reward)
    }
}
