//! Gain-density heuristic policy.
//!
//! Scores every candidate by the demand it would newly cover per unit of
//! travel. Serves as a non-learned baseline and as a deterministic scorer in
//! tests.

use super::trait_::{Policy, PolicyOutput};
use crate::algorithms::rl::observation::Observation;
use crate::instance::DEPOT;

/// Greedy coverage-per-distance scorer.
///
/// ```text
/// density(i) = gain(i) / (ε + d(current, i))
/// score(i)   = sharpness × density(i) / max_j density(j)   if gain(i) > 0
///            = -sharpness                                 otherwise
/// score(depot) = 0
/// ```
///
/// Under greedy decoding the depot is therefore chosen exactly when no
/// feasible node adds coverage.
#[derive(Debug, Clone)]
pub struct GainDensityPolicy {
    sharpness: f64,
    eps: f64,
}

impl GainDensityPolicy {
    pub fn new(sharpness: f64) -> Self {
        Self {
            sharpness,
            eps: 1e-6,
        }
    }

    fn score_one(&self, obs: &Observation<'_>) -> PolicyOutput {
        let n = obs.n_nodes();
        let gain: Vec<f64> = match &obs.gain {
            Some(g) => g.clone(),
            None => obs.nodes.iter().map(|node| node.packet).collect(),
        };
        let density: Vec<f64> = (0..n)
            .map(|i| gain[i] / (self.eps + obs.distances_from_current[i]))
            .collect();
        let max_density = density
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != DEPOT)
            .map(|(_, &d)| d)
            .fold(0.0_f64, f64::max);

        let scores = (0..n)
            .map(|i| {
                if i == DEPOT {
                    0.0
                } else if gain[i] > 0.0 && max_density > 0.0 {
                    self.sharpness * density[i] / max_density
                } else {
                    -self.sharpness
                }
            })
            .collect();

        PolicyOutput {
            scores,
            // covered fraction is a crude but monotone proxy for the outcome
            value: obs.dynamic[3],
        }
    }
}

impl Default for GainDensityPolicy {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl Policy for GainDensityPolicy {
    fn evaluate(&mut self, observations: &[Observation<'_>]) -> Vec<PolicyOutput> {
        observations.iter().map(|obs| self.score_one(obs)).collect()
    }

    fn name(&self) -> &str {
        "gain_density"
    }
}
