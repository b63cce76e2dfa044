//! Behaviour-cloning loss over a teacher-forced rollout.

use crate::algorithms::rl::config::TrainingConfig;
use crate::algorithms::rl::rollout::Rollout;
use crate::instance::DemoSource;

/// Source-weighted cross-entropy against demonstration tours.
///
/// Per episode: mean over active ticks of `-log p(teacher node)`, where the
/// decoder already floors the probability so infeasible teacher moves cost
/// `-ln(log_prob_floor)` instead of infinity. The batch loss is
/// `mean_b(weight_b × loss_b)` with weights taken from the demonstration source.
#[derive(Debug, Clone, PartialEq)]
pub struct ImitationLoss {
    pub per_episode: Vec<f64>,
    pub weights: Vec<f64>,
    pub total: f64,
}

impl ImitationLoss {
    pub fn compute(rollout: &Rollout, sources: &[DemoSource], config: &TrainingConfig) -> Self {
        let per_episode: Vec<f64> = rollout
            .trajectories
            .iter()
            .map(|t| {
                let n = t.n_active_steps();
                if n == 0 {
                    0.0
                } else {
                    -t.log_prob_sum() / n as f64
                }
            })
            .collect();
        let weights: Vec<f64> = per_episode
            .iter()
            .enumerate()
            .map(|(b, _)| {
                sources
                    .get(b)
                    .map_or(config.heuristic_weight, |&s| config.source_weight(s))
            })
            .collect();
        let b = per_episode.len().max(1) as f64;
        let total = per_episode
            .iter()
            .zip(&weights)
            .map(|(l, w)| l * w)
            .sum::<f64>()
            / b;

        Self {
            per_episode,
            weights,
            total,
        }
    }
}
