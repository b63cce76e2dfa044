//! Policy trait: the black-box scorer driving the decoder.

use crate::algorithms::rl::observation::Observation;
use crate::instance::Instance;

/// Scores for one episode at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutput {
    /// One unnormalized logit per node.
    pub scores: Vec<f64>,
    /// Estimated future reward from the current state.
    pub value: f64,
}

/// A scorer mapping observations to per-node logits and a value estimate.
///
/// Policies observe snapshots only; they never mutate the environment. Any
/// hidden state must come from [`Policy::begin_rollout`] (context encoding).
pub trait Policy: Send + Sync {
    /// Called once per rollout before the first tick.
    fn begin_rollout(&mut self, _instances: &[Instance]) {}

    /// Scores every episode of the batch in one call.
    ///
    /// Must return one output per observation with one score per node.
    fn evaluate(&mut self, observations: &[Observation<'_>]) -> Vec<PolicyOutput>;

    /// Returns a human-readable name for this policy.
    fn name(&self) -> &str;
}
