//! Configuration for the routing environment, decoding, and training.

use crate::instance::DemoSource;

/// Configuration for the batched environment and the decoder.
#[derive(Debug, Clone)]
pub struct RLConfig {
    // --- Environment ---
    /// An episode terminates once its remaining budget drops below this value.
    pub budget_epsilon: f64,
    /// Added to denominators (budget, total packets) to avoid division by zero.
    pub denom_epsilon: f64,
    /// Rollouts stop after `n_nodes + step_margin` ticks.
    pub step_margin: usize,

    // --- Decoding ---
    /// Bias raw scores with `gain_bias_scale × ln(1 + gain / max_gain)`.
    pub use_gain_bias: bool,
    /// Coefficient of the marginal-gain bias.
    pub gain_bias_scale: f64,
    /// Added to the per-step maximum gain when normalizing.
    pub gain_normalizer_epsilon: f64,
    /// Probability floor used for teacher cross-entropy on masked targets.
    pub log_prob_floor: f64,
}

impl RLConfig {
    /// Safety bound on the number of ticks in one rollout.
    pub fn step_cap(&self, n_nodes: usize) -> usize {
        n_nodes + self.step_margin
    }
}

impl Default for RLConfig {
    fn default() -> Self {
        Self {
            budget_epsilon: 1e-8,
            denom_epsilon: 1e-9,
            step_margin: 5,
            use_gain_bias: true,
            gain_bias_scale: 0.2,
            gain_normalizer_epsilon: 1e-6,
            log_prob_floor: 1e-12,
        }
    }
}

/// Loss weighting and optimizer hyperparameters.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Weight of the covered packet fraction in the terminal reward.
    pub coverage_weight: f64,
    /// Weight of the tour-length-over-budget penalty.
    pub tour_weight: f64,
    /// Value loss coefficient.
    pub value_coef: f64,
    /// Entropy bonus coefficient.
    pub entropy_coef: f64,
    /// Global gradient norm limit.
    pub max_grad_norm: f64,
    /// Adam learning rate.
    pub learning_rate: f64,
    pub adam_beta1: f64,
    pub adam_beta2: f64,
    pub adam_epsilon: f64,
    /// Imitation weight for demonstrations from an exact solver.
    pub exact_weight: f64,
    /// Imitation weight for heuristic demonstrations.
    pub heuristic_weight: f64,
    /// Episodes per training batch.
    pub batch_size: usize,
    /// Log progress every this many iterations.
    pub log_every: usize,
}

impl TrainingConfig {
    /// Imitation weight for a demonstration source.
    pub fn source_weight(&self, source: DemoSource) -> f64 {
        match source {
            DemoSource::Exact => self.exact_weight,
            DemoSource::Heuristic => self.heuristic_weight,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            coverage_weight: 2.0,
            tour_weight: 1.0,
            value_coef: 0.5,
            entropy_coef: 0.01,
            max_grad_norm: 1.0,
            learning_rate: 1e-4,
            adam_beta1: 0.9,
            adam_beta2: 0.999,
            adam_epsilon: 1e-8,
            exact_weight: 2.0,
            heuristic_weight: 1.0,
            batch_size: 32,
            log_every: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_step_cap_has_margin_five() {
        let cfg = RLConfig::default();
        assert_eq!(cfg.step_cap(10), 15);
    }

    #[test]
    fn exact_demonstrations_weigh_more() {
        let cfg = TrainingConfig::default();
        assert!(cfg.source_weight(DemoSource::Exact) > cfg.source_weight(DemoSource::Heuristic));
    }
}
