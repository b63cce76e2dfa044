//! Training loop for [`LinearPolicy`]: REINFORCE with a value baseline and
//! source-weighted behaviour cloning.
//!
//! Gradients are computed analytically by replaying a finished rollout: the
//! environment is deterministic, so stepping a fresh environment with the
//! recorded actions reproduces every observation the policy saw.

use std::collections::BTreeMap;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::imitation::ImitationLoss;
use super::loss::PolicyGradientLoss;
use super::optim::{clip_grad_norm, Adam};
use crate::algorithms::rl::config::{RLConfig, TrainingConfig};
use crate::algorithms::rl::decoder::{masked_log_softmax, Decoder};
use crate::algorithms::rl::environment::RoutingEnvironment;
use crate::algorithms::rl::policy::linear::{NODE_FEATURES, VALUE_FEATURES};
use crate::algorithms::rl::policy::{LinearPolicy, StepGradient};
use crate::algorithms::rl::rollout::{Rollout, RolloutController};
use crate::algorithms::rl::types::DecodeMode;
use crate::error::RouterError;
use crate::instance::{Instance, InstanceBatch, InstanceRecord, SyntheticGenerator};

/// Summary of one optimizer step.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainStats {
    pub iteration: usize,
    pub loss: f64,
    /// Mean terminal reward (0 for imitation steps).
    pub mean_reward: f64,
    pub mean_covered: f64,
    pub mean_total: f64,
    pub mean_tour_length: f64,
    /// Global gradient norm before clipping.
    pub grad_norm: f64,
}

/// Trains a [`LinearPolicy`] with Adam.
pub struct Trainer {
    pub policy: LinearPolicy,
    pub rl_config: RLConfig,
    pub train_config: TrainingConfig,
    optimizer: Adam,
    iteration: usize,
}

impl Trainer {
    pub fn new(policy: LinearPolicy, rl_config: RLConfig, train_config: TrainingConfig) -> Self {
        let optimizer = Adam::new(LinearPolicy::n_params(), &train_config);
        Self {
            policy,
            rl_config,
            train_config,
            optimizer,
            iteration: 0,
        }
    }

    /// Optimizer steps taken so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// One policy-gradient update from a sampled rollout over `instances`.
    pub fn reinforce_step<R: Rng + ?Sized>(
        &mut self,
        instances: &[Instance],
        rng: &mut R,
    ) -> Result<TrainStats, RouterError> {
        let mut env = RoutingEnvironment::new(instances, self.rl_config.clone())?;
        let controller = RolloutController::new(DecodeMode::Sample, self.rl_config.clone());
        let rollout = controller.run(&mut env, &mut self.policy, rng, None)?;
        let loss =
            PolicyGradientLoss::compute(&rollout, instances, &self.rl_config, &self.train_config);

        let b = rollout.batch_size().max(1) as f64;
        let n_active: Vec<f64> = rollout
            .trajectories
            .iter()
            .map(|t| t.n_active_steps().max(1) as f64)
            .collect();
        let entropy_coef = self.train_config.entropy_coef;
        let value_coef = self.train_config.value_coef;

        let mut grad = vec![0.0; LinearPolicy::n_params()];
        self.replay(instances, &rollout, |e, step, psi| {
            if let Some(g) = step {
                for k in 0..NODE_FEATURES {
                    grad[k] -= loss.advantages[e] * g.log_prob[k] / b;
                    grad[k] -= entropy_coef * g.entropy[k] / (n_active[e] * b);
                }
            }
            // baseline_b - reward_b = -advantage_b
            let coeff = -value_coef * 2.0 * loss.advantages[e] / (n_active[e] * b);
            for k in 0..VALUE_FEATURES {
                grad[NODE_FEATURES + k] += coeff * psi[k];
            }
        })?;

        let grad_norm = self.apply(&mut grad);
        let (mean_covered, mean_total, mean_tour_length) = episode_means(&env);
        let stats = TrainStats {
            iteration: self.iteration,
            loss: loss.total,
            mean_reward: loss.mean_reward(),
            mean_covered,
            mean_total,
            mean_tour_length,
            grad_norm,
        };
        self.log_progress("RL", &stats);
        Ok(stats)
    }

    /// One behaviour-cloning update along the batch's demonstration tours.
    pub fn imitation_step(&mut self, batch: &InstanceBatch) -> Result<TrainStats, RouterError> {
        let instances = batch.instances();
        let mut env = RoutingEnvironment::new(instances, self.rl_config.clone())?;
        let controller = RolloutController::new(DecodeMode::TeacherForced, self.rl_config.clone());
        // teacher forcing never draws
        let mut rng = StdRng::seed_from_u64(0);
        let rollout = controller.run(&mut env, &mut self.policy, &mut rng, Some(batch.tours()))?;
        let loss = ImitationLoss::compute(&rollout, batch.sources(), &self.train_config);

        let b = rollout.batch_size().max(1) as f64;
        let scale: Vec<f64> = rollout
            .trajectories
            .iter()
            .zip(&loss.weights)
            .map(|(t, w)| w / (t.n_active_steps().max(1) as f64 * b))
            .collect();

        let mut grad = vec![0.0; LinearPolicy::n_params()];
        self.replay(instances, &rollout, |e, step, _| {
            if let Some(g) = step {
                for k in 0..NODE_FEATURES {
                    grad[k] -= scale[e] * g.log_prob[k];
                }
            }
        })?;

        let grad_norm = self.apply(&mut grad);
        let (mean_covered, mean_total, mean_tour_length) = episode_means(&env);
        let stats = TrainStats {
            iteration: self.iteration,
            loss: loss.total,
            mean_reward: 0.0,
            mean_covered,
            mean_total,
            mean_tour_length,
            grad_norm,
        };
        self.log_progress("BC", &stats);
        Ok(stats)
    }

    /// Runs `iterations` policy-gradient updates on freshly generated batches.
    pub fn fit_reinforce<R: Rng + ?Sized>(
        &mut self,
        generator: &mut SyntheticGenerator,
        iterations: usize,
        rng: &mut R,
    ) -> Result<Vec<TrainStats>, RouterError> {
        let mut curve = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            let batch = generator.batch(self.train_config.batch_size)?;
            curve.push(self.reinforce_step(batch.instances(), rng)?);
        }
        Ok(curve)
    }

    /// Runs `epochs` passes of behaviour cloning over `records`.
    ///
    /// Records are grouped by node count so every batch is uniform, then
    /// chunked into batches of `batch_size`. All records are validated before
    /// the first update; records whose tour is only the depot are skipped.
    pub fn fit_imitation(
        &mut self,
        records: &[InstanceRecord],
        epochs: usize,
    ) -> Result<Vec<TrainStats>, RouterError> {
        let mut groups: BTreeMap<usize, Vec<(Instance, &InstanceRecord)>> = BTreeMap::new();
        for (line, record) in records.iter().enumerate() {
            let instance = record
                .to_instance()
                .map_err(|source| RouterError::Record {
                    line: line + 1,
                    source,
                })?;
            if !record.has_demonstration() {
                debug!("Record {} has no demonstration tour, skipping", line + 1);
                continue;
            }
            groups
                .entry(instance.n_nodes())
                .or_default()
                .push((instance, record));
        }

        let mut batches = Vec::new();
        for group in groups.values() {
            for chunk in group.chunks(self.train_config.batch_size.max(1)) {
                batches.push(InstanceBatch::with_demonstrations(
                    chunk.iter().map(|(inst, _)| inst.clone()).collect(),
                    chunk.iter().map(|(_, r)| r.tour.clone()).collect(),
                    chunk.iter().map(|(_, r)| r.source).collect(),
                )?);
            }
        }
        debug!(
            "Behaviour cloning on {} records in {} batches",
            records.len(),
            batches.len()
        );

        let mut curve = Vec::with_capacity(epochs * batches.len());
        for _ in 0..epochs {
            for batch in &batches {
                curve.push(self.imitation_step(batch)?);
            }
        }
        Ok(curve)
    }

    /// Re-runs `rollout` and calls `visit(episode, gradient, value_features)`
    /// for every active tick. The gradient is `None` when the mask was empty
    /// (a stranded demonstration move).
    fn replay<F>(
        &self,
        instances: &[Instance],
        rollout: &Rollout,
        mut visit: F,
    ) -> Result<(), RouterError>
    where
        F: FnMut(usize, Option<StepGradient>, &[f64; VALUE_FEATURES]),
    {
        let mut env = RoutingEnvironment::new(instances, self.rl_config.clone())?;
        let decoder = Decoder::new(rollout.mode, self.rl_config.clone());

        for t in 0..rollout.ticks {
            let masks = env.feasible_mask();
            let observations = env.observations(true);
            let mut actions = Vec::with_capacity(observations.len());
            for (e, (traj, obs)) in rollout.trajectories.iter().zip(&observations).enumerate() {
                let step = &traj.steps[t];
                actions.push(step.action);
                if !step.active {
                    continue;
                }
                let psi = LinearPolicy::value_features(obs);
                let logits = decoder.logits(&self.policy.forward(obs).scores, obs.gain.as_deref());
                let gradient = masked_log_softmax(&logits, &masks[e]).map(|log_probs| {
                    let features = LinearPolicy::node_features(obs);
                    LinearPolicy::step_gradient(&features, &log_probs, &masks[e], step.action)
                });
                visit(e, gradient, &psi);
            }
            env.step(&actions)?;
        }
        Ok(())
    }

    /// Clips, applies one Adam step, and returns the pre-clip norm.
    fn apply(&mut self, grad: &mut [f64]) -> f64 {
        let norm = clip_grad_norm(grad, self.train_config.max_grad_norm);
        let mut params = self.policy.params();
        self.optimizer.step(&mut params, grad);
        self.policy.set_params(&params);
        self.iteration += 1;
        norm
    }

    fn log_progress(&self, phase: &str, stats: &TrainStats) {
        let every = self.train_config.log_every.max(1);
        if stats.iteration % every == 0 {
            info!(
                "[{}] it {:04}  loss {:.3}  R {:.3}  covered {:.2}/{:.2}  tour {:.3}  |g| {:.3}",
                phase,
                stats.iteration,
                stats.loss,
                stats.mean_reward,
                stats.mean_covered,
                stats.mean_total,
                stats.mean_tour_length,
                stats.grad_norm
            );
        }
    }
}

/// Mean covered value, total value, and tour length over the environment's episodes.
fn episode_means(env: &RoutingEnvironment<'_>) -> (f64, f64, f64) {
    let n = env.batch_size().max(1) as f64;
    let (covered, total, length) = env.episodes().iter().zip(env.instances()).fold(
        (0.0, 0.0, 0.0),
        |(c, t, l), (state, inst)| {
            (
                c + state.covered_value(inst),
                t + inst.total_packets(),
                l + state.tour_length(),
            )
        },
    );
    (covered / n, total / n, length / n)
}
