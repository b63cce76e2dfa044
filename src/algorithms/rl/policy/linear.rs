//! Trainable linear scorer.
//!
//! Scores each node with a dot product over hand-built features and estimates
//! the state value with a second linear head over the dynamic context. The
//! analytic gradients exposed here let the trainer run policy-gradient and
//! behaviour-cloning updates without an autodiff backend.

use super::trait_::{Policy, PolicyOutput};
use crate::algorithms::rl::observation::{Observation, DYNAMIC_FEATURE_DIM};
use crate::instance::DEPOT;

/// Number of per-node scoring features.
pub const NODE_FEATURES: usize = 6;
/// Number of value-head features (bias + dynamic context).
pub const VALUE_FEATURES: usize = 1 + DYNAMIC_FEATURE_DIM;

/// Linear policy with a linear value head.
///
/// Node features:
/// `[gain / max_gain, d(current, i), d(i, depot), is_depot,
///   is_depot × (1 - remaining_fraction), is_depot × covered_fraction]`.
///
/// Value features: `[1, remaining_fraction, last_move, tour_fraction, covered_fraction]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPolicy {
    pub weights: [f64; NODE_FEATURES],
    pub value_weights: [f64; VALUE_FEATURES],
}

/// Gradients of one decoding step with respect to the scoring weights.
#[derive(Debug, Clone, PartialEq)]
pub struct StepGradient {
    /// `∂ log p(action) / ∂w`; zero when the action was infeasible.
    pub log_prob: [f64; NODE_FEATURES],
    /// `∂ H / ∂w` for the masked distribution's entropy.
    pub entropy: [f64; NODE_FEATURES],
}

impl LinearPolicy {
    pub fn new(weights: [f64; NODE_FEATURES], value_weights: [f64; VALUE_FEATURES]) -> Self {
        Self {
            weights,
            value_weights,
        }
    }

    /// Total number of trainable parameters.
    pub fn n_params() -> usize {
        NODE_FEATURES + VALUE_FEATURES
    }

    /// Flat parameter vector: scoring weights followed by value weights.
    pub fn params(&self) -> Vec<f64> {
        self.weights
            .iter()
            .chain(self.value_weights.iter())
            .copied()
            .collect()
    }

    /// Overwrites the parameters from a flat vector laid out like [`params`](Self::params).
    pub fn set_params(&mut self, params: &[f64]) {
        let (w, v) = params.split_at(NODE_FEATURES.min(params.len()));
        for (dst, src) in self.weights.iter_mut().zip(w) {
            *dst = *src;
        }
        for (dst, src) in self.value_weights.iter_mut().zip(v) {
            *dst = *src;
        }
    }

    /// Per-node feature rows for one observation.
    pub fn node_features(obs: &Observation<'_>) -> Vec<[f64; NODE_FEATURES]> {
        let n = obs.n_nodes();
        let [remaining, _, _, covered] = obs.dynamic;
        let max_gain = obs
            .gain
            .as_ref()
            .map(|g| g.iter().copied().fold(0.0_f64, f64::max))
            .unwrap_or(0.0);
        (0..n)
            .map(|i| {
                let gain = obs.gain.as_ref().map_or(0.0, |g| g[i]);
                let is_depot = if i == DEPOT { 1.0 } else { 0.0 };
                [
                    gain / (max_gain + obs.gain_epsilon),
                    obs.distances_from_current[i],
                    obs.distances_to_depot[i],
                    is_depot,
                    is_depot * (1.0 - remaining),
                    is_depot * covered,
                ]
            })
            .collect()
    }

    /// Value-head features for one observation.
    pub fn value_features(obs: &Observation<'_>) -> [f64; VALUE_FEATURES] {
        let mut psi = [1.0; VALUE_FEATURES];
        psi[1..].copy_from_slice(&obs.dynamic);
        psi
    }

    fn score(&self, phi: &[f64; NODE_FEATURES]) -> f64 {
        self.weights.iter().zip(phi).map(|(w, x)| w * x).sum()
    }

    /// Scores and value for one observation.
    pub fn forward(&self, obs: &Observation<'_>) -> PolicyOutput {
        let scores = Self::node_features(obs)
            .iter()
            .map(|phi| self.score(phi))
            .collect();
        let psi = Self::value_features(obs);
        let value = self
            .value_weights
            .iter()
            .zip(psi.iter())
            .map(|(v, x)| v * x)
            .sum();
        PolicyOutput { scores, value }
    }

    /// Gradients of `log p(action)` and of the entropy with respect to the
    /// scoring weights, given the masked log-probabilities the decoder used.
    pub fn step_gradient(
        features: &[[f64; NODE_FEATURES]],
        log_probs: &[f64],
        mask: &[bool],
        action: usize,
    ) -> StepGradient {
        let probs: Vec<f64> = log_probs
            .iter()
            .zip(mask)
            .map(|(&lp, &m)| if m { lp.exp() } else { 0.0 })
            .collect();
        let entropy: f64 = -probs
            .iter()
            .zip(log_probs)
            .filter(|&(&p, _)| p > 0.0)
            .map(|(&p, &lp)| p * lp)
            .sum::<f64>();

        let mut expected = [0.0; NODE_FEATURES];
        let mut d_entropy = [0.0; NODE_FEATURES];
        for (i, phi) in features.iter().enumerate() {
            if probs[i] <= 0.0 {
                continue;
            }
            // ∂H/∂z_i = -p_i (log p_i + H)
            let dh_dz = -probs[i] * (log_probs[i] + entropy);
            for k in 0..NODE_FEATURES {
                expected[k] += probs[i] * phi[k];
                d_entropy[k] += dh_dz * phi[k];
            }
        }

        let mut d_log_prob = [0.0; NODE_FEATURES];
        if mask.get(action).copied().unwrap_or(false) {
            for k in 0..NODE_FEATURES {
                d_log_prob[k] = features[action][k] - expected[k];
            }
        }

        StepGradient {
            log_prob: d_log_prob,
            entropy: d_entropy,
        }
    }
}

impl Default for LinearPolicy {
    fn default() -> Self {
        Self {
            weights: [3.0, -2.0, -0.5, -1.0, 2.0, 1.0],
            value_weights: [0.0; VALUE_FEATURES],
        }
    }
}

impl Policy for LinearPolicy {
    fn evaluate(&mut self, observations: &[Observation<'_>]) -> Vec<PolicyOutput> {
        observations.iter().map(|obs| self.forward(obs)).collect()
    }

    fn name(&self) -> &str {
        "linear"
    }
}
