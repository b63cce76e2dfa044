//! Policy-gradient loss over a sampled rollout.
//!
//! Terminal reward per episode, baseline = mean value estimate over the
//! episode's active ticks (treated as a constant), and
//!
//! ```text
//! policy  = -mean_b( adv_b × Σ_t log p_bt )
//! value   =  mean_b( (baseline_b - reward_b)² )
//! entropy =  mean_b( mean_t H_bt )
//! total   =  policy + value_coef × value - entropy_coef × entropy
//! ```
//!
//! Only active ticks contribute; placeholder records of finished episodes are
//! skipped by their `active` flag.

use crate::algorithms::rl::config::{RLConfig, TrainingConfig};
use crate::algorithms::rl::reward::RewardComputer;
use crate::algorithms::rl::rollout::Rollout;
use crate::instance::Instance;

/// Components of the policy-gradient objective for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyGradientLoss {
    pub rewards: Vec<f64>,
    pub baselines: Vec<f64>,
    pub advantages: Vec<f64>,
    pub policy_loss: f64,
    pub value_loss: f64,
    pub entropy: f64,
    pub total: f64,
}

impl PolicyGradientLoss {
    pub fn compute(
        rollout: &Rollout,
        instances: &[Instance],
        rl: &RLConfig,
        config: &TrainingConfig,
    ) -> Self {
        let rewards = RewardComputer::for_rollout(rollout, instances, rl, config);
        let baselines: Vec<f64> = rollout.trajectories.iter().map(|t| t.mean_value()).collect();
        let advantages: Vec<f64> = rewards
            .iter()
            .zip(&baselines)
            .map(|(r, v)| r - v)
            .collect();

        let b = rollout.batch_size().max(1) as f64;
        let policy_loss = -rollout
            .trajectories
            .iter()
            .zip(&advantages)
            .map(|(t, adv)| t.log_prob_sum() * adv)
            .sum::<f64>()
            / b;
        let value_loss = advantages.iter().map(|a| a * a).sum::<f64>() / b;
        let entropy = rollout
            .trajectories
            .iter()
            .map(|t| t.mean_entropy())
            .sum::<f64>()
            / b;
        let total = policy_loss + config.value_coef * value_loss - config.entropy_coef * entropy;

        Self {
            rewards,
            baselines,
            advantages,
            policy_loss,
            value_loss,
            entropy,
            total,
        }
    }

    pub fn mean_reward(&self) -> f64 {
        if self.rewards.is_empty() {
            return 0.0;
        }
        self.rewards.iter().sum::<f64>() / self.rewards.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::rl::episode::EpisodeState;
    use crate::algorithms::rl::rollout::{StepRecord, Trajectory};
    use crate::algorithms::rl::types::DecodeMode;
    use crate::algorithms::rl::RoutingEnvironment;
    use crate::instance::DEPOT;

    fn triangle() -> Instance {
        Instance::from_points(&[(0.0, 0.0), (3.0, 0.0), (0.0, 4.0)], &[0.0, 5.0, 7.0], 10.0)
            .unwrap()
    }

    fn record(action: usize, log_prob: f64, value: f64, active: bool) -> StepRecord {
        StepRecord {
            action,
            log_prob,
            value,
            entropy: if active { 0.5 } else { 0.0 },
            active,
            followed_teacher: false,
        }
    }

    /// Episode visiting A then returning, with hand-written records.
    fn finished_episode(instances: &[Instance]) -> EpisodeState {
        let mut env = RoutingEnvironment::new(instances, RLConfig::default()).unwrap();
        env.step(&[1]).unwrap();
        env.step(&[DEPOT]).unwrap();
        env.episode(0).clone()
    }

    #[test]
    fn components_match_hand_computation() {
        let instances = vec![triangle()];
        let rollout = Rollout {
            trajectories: vec![Trajectory {
                steps: vec![
                    record(1, -0.7, 0.1, true),
                    record(DEPOT, -0.2, 0.3, true),
                    record(DEPOT, 0.0, 9.0, false),
                ],
                final_state: finished_episode(&instances),
            }],
            ticks: 3,
            truncated: false,
            mode: DecodeMode::Sample,
        };
        let config = TrainingConfig::default();
        let loss = PolicyGradientLoss::compute(&rollout, &instances, &RLConfig::default(), &config);

        let reward = 2.0 * 5.0 / 12.0 - 6.0 / 10.0;
        // inactive record's value 9.0 is excluded
        let baseline = 0.2;
        let adv = reward - baseline;
        assert!((loss.rewards[0] - reward).abs() < 1e-6);
        assert!((loss.baselines[0] - baseline).abs() < 1e-12);
        assert!((loss.policy_loss - 0.9 * adv).abs() < 1e-6);
        assert!((loss.value_loss - adv * adv).abs() < 1e-6);
        assert!((loss.entropy - 0.5).abs() < 1e-12);
        let total = loss.policy_loss + 0.5 * loss.value_loss - 0.01 * 0.5;
        assert!((loss.total - total).abs() < 1e-12);
    }

    #[test]
    fn empty_rollout_has_finite_loss() {
        let instances = vec![triangle()];
        let env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let rollout = Rollout {
            trajectories: vec![Trajectory {
                steps: Vec::new(),
                final_state: env.episode(0).clone(),
            }],
            ticks: 0,
            truncated: true,
            mode: DecodeMode::Greedy,
        };
        let loss = PolicyGradientLoss::compute(
            &rollout,
            &instances,
            &RLConfig::default(),
            &TrainingConfig::default(),
        );
        assert_eq!(loss.policy_loss, 0.0);
        assert!(loss.total.is_finite());
    }
}
