//! Random policy for testing and baselines.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::trait_::{Policy, PolicyOutput};
use crate::algorithms::rl::observation::Observation;

/// Draws independent uniform logits in `[-scale, scale]` for every node.
///
/// Seeded, so two policies with the same seed produce the same scores.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
    scale: f64,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            scale: 1.0,
        }
    }

    /// Sets the logit range.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale.abs();
        self
    }
}

impl Policy for RandomPolicy {
    fn evaluate(&mut self, observations: &[Observation<'_>]) -> Vec<PolicyOutput> {
        observations
            .iter()
            .map(|obs| PolicyOutput {
                scores: (0..obs.n_nodes())
                    .map(|_| self.rng.gen_range(-1.0..=1.0) * self.scale)
                    .collect(),
                value: 0.0,
            })
            .collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}
