//! Rollout controller: drives environment, policy, and decoder in lock-step.

use log::{debug, warn};
use rand::Rng;

use super::config::RLConfig;
use super::decoder::Decoder;
use super::environment::RoutingEnvironment;
use super::episode::EpisodeState;
use super::policy::Policy;
use super::types::DecodeMode;
use crate::error::{RouterError, ShapeError};
use crate::instance::DEPOT;

/// One tick of one episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    pub action: usize,
    /// Decoder log-probability of `action` (floored).
    pub log_prob: f64,
    /// Policy value estimate at the state the action was taken from.
    pub value: f64,
    /// Entropy of the masked distribution at that state.
    pub entropy: f64,
    /// Whether the episode was active when the tick began. Inactive records
    /// are placeholders that keep every trajectory the same length.
    pub active: bool,
    pub followed_teacher: bool,
}

impl StepRecord {
    fn inert(value: f64) -> Self {
        Self {
            action: DEPOT,
            log_prob: 0.0,
            value,
            entropy: 0.0,
            active: false,
            followed_teacher: false,
        }
    }
}

/// Per-episode sequence of tick records plus the terminal state.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub steps: Vec<StepRecord>,
    pub final_state: EpisodeState,
}

impl Trajectory {
    fn active_steps(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| s.active)
    }

    /// Number of ticks during which the episode was active.
    pub fn n_active_steps(&self) -> usize {
        self.active_steps().count()
    }

    /// Actions actually applied to the environment.
    pub fn actions(&self) -> Vec<usize> {
        self.active_steps().map(|s| s.action).collect()
    }

    pub fn log_prob_sum(&self) -> f64 {
        self.active_steps().map(|s| s.log_prob).sum()
    }

    /// Mean value estimate over active ticks, 0 when there are none.
    pub fn mean_value(&self) -> f64 {
        mean(self.active_steps().map(|s| s.value))
    }

    /// Mean decoder entropy over active ticks, 0 when there are none.
    pub fn mean_entropy(&self) -> f64 {
        mean(self.active_steps().map(|s| s.entropy))
    }

    /// Visited nodes in order, starting at the depot.
    pub fn tour(&self) -> &[usize] {
        self.final_state.path()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Output of one batched rollout.
#[derive(Debug, Clone)]
pub struct Rollout {
    /// One trajectory per episode, all with `ticks` records.
    pub trajectories: Vec<Trajectory>,
    pub ticks: usize,
    /// True when the step cap was hit with episodes still active.
    pub truncated: bool,
    pub mode: DecodeMode,
}

impl Rollout {
    /// True when no tick was executed.
    pub fn is_empty(&self) -> bool {
        self.ticks == 0
    }

    pub fn batch_size(&self) -> usize {
        self.trajectories.len()
    }

    pub fn final_states(&self) -> impl Iterator<Item = &EpisodeState> {
        self.trajectories.iter().map(|t| &t.final_state)
    }
}

/// Runs a batch of episodes from their current state to termination.
///
/// Each tick computes masks and gains for the whole batch, queries the policy
/// once, decodes one action per active episode, then steps the environment.
/// The loop stops when every episode has terminated or after
/// `max_steps.unwrap_or(N + step_margin)` ticks.
///
/// The environment is not reset here; call [`RoutingEnvironment::reset`]
/// first when reusing it.
#[derive(Debug, Clone)]
pub struct RolloutController {
    pub config: RLConfig,
    pub mode: DecodeMode,
    /// Overrides the default `N + step_margin` tick cap.
    pub max_steps: Option<usize>,
}

impl RolloutController {
    pub fn new(mode: DecodeMode, config: RLConfig) -> Self {
        Self {
            config,
            mode,
            max_steps: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Tick cap for `n_nodes` nodes.
    pub fn step_cap(&self, n_nodes: usize) -> usize {
        self.max_steps
            .unwrap_or_else(|| self.config.step_cap(n_nodes))
    }

    /// Drives `env` to completion.
    ///
    /// `demonstrations` holds one depot-rooted tour per episode and is read by
    /// the teacher-forcing modes. Each episode follows its tour from its own
    /// move count, so a partly played environment picks up mid-tour; once a
    /// tour is exhausted the depot is forced.
    ///
    /// # Errors
    ///
    /// - [`RouterError::MissingDemonstrations`] for a teacher-forcing mode
    ///   without demonstrations.
    /// - [`ShapeError`] when the demonstrations or the policy outputs do not
    ///   match the batch.
    /// - [`RouterError::EmptyMask`] if an active episode has no feasible action.
    /// - [`RouterError::InvalidAction`] if a demonstration names an unknown node.
    pub fn run<P, R>(
        &self,
        env: &mut RoutingEnvironment<'_>,
        policy: &mut P,
        rng: &mut R,
        demonstrations: Option<&[Vec<usize>]>,
    ) -> Result<Rollout, RouterError>
    where
        P: Policy + ?Sized,
        R: Rng + ?Sized,
    {
        let batch = env.batch_size();
        let n_nodes = env.n_nodes();
        if self.mode.needs_demonstration() && demonstrations.is_none() {
            return Err(RouterError::MissingDemonstrations { mode: self.mode });
        }
        if let Some(demos) = demonstrations {
            if demos.len() != batch {
                return Err(ShapeError::LengthMismatch {
                    what: "demonstrations",
                    expected: batch,
                    found: demos.len(),
                }
                .into());
            }
        }

        let decoder = Decoder::new(self.mode, self.config.clone());
        let cap = self.step_cap(n_nodes);
        let mut steps: Vec<Vec<StepRecord>> = vec![Vec::with_capacity(cap); batch];
        policy.begin_rollout(env.instances());

        let mut ticks = 0;
        while ticks < cap && !env.all_terminated() {
            let masks = env.feasible_mask();
            let observations = env.observations(true);
            let outputs = policy.evaluate(&observations);
            if outputs.len() != batch {
                return Err(ShapeError::LengthMismatch {
                    what: "policy outputs",
                    expected: batch,
                    found: outputs.len(),
                }
                .into());
            }

            let mut actions = Vec::with_capacity(batch);
            for (e, (output, obs)) in outputs.iter().zip(&observations).enumerate() {
                if output.scores.len() != n_nodes {
                    return Err(ShapeError::LengthMismatch {
                        what: "policy scores",
                        expected: n_nodes,
                        found: output.scores.len(),
                    }
                    .into());
                }
                if !env.episode(e).is_active() {
                    actions.push(DEPOT);
                    steps[e].push(StepRecord::inert(output.value));
                    continue;
                }

                let next = env.episode(e).n_moves() + 1;
                let teacher = demonstrations
                    .map(|demos| demos[e].get(next).copied().unwrap_or(DEPOT));
                let logits = decoder.logits(&output.scores, obs.gain.as_deref());
                let decision = decoder
                    .decode(&logits, &masks[e], teacher, rng)
                    .ok_or(RouterError::EmptyMask { episode: e })?;
                if decision.followed_teacher && !masks[e].get(decision.action).copied().unwrap_or(false)
                {
                    warn!(
                        "Episode {}: demonstration move to node {} is infeasible at tick {}",
                        e, decision.action, ticks
                    );
                }

                actions.push(decision.action);
                steps[e].push(StepRecord {
                    action: decision.action,
                    log_prob: decision.log_prob,
                    value: output.value,
                    entropy: decision.entropy,
                    active: true,
                    followed_teacher: decision.followed_teacher,
                });
            }

            env.step(&actions)?;
            ticks += 1;
        }

        let truncated = !env.all_terminated();
        if truncated {
            warn!(
                "Rollout hit the step cap ({}) with {} of {} episodes still active",
                cap,
                env.n_active(),
                batch
            );
        }
        debug!(
            "{} rollout with {}: {} ticks, batch {}",
            self.mode,
            policy.name(),
            ticks,
            batch
        );

        let trajectories = steps
            .into_iter()
            .zip(env.episodes())
            .map(|(steps, state)| Trajectory {
                steps,
                final_state: state.clone(),
            })
            .collect();

        Ok(Rollout {
            trajectories,
            ticks,
            truncated,
            mode: self.mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::rl::policy::{GainDensityPolicy, LinearPolicy, RandomPolicy};
    use crate::instance::{Instance, SynthConfig, SyntheticGenerator};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn triangle(budget: f64) -> Instance {
        Instance::from_points(&[(0.0, 0.0), (3.0, 0.0), (0.0, 4.0)], &[0.0, 5.0, 7.0], budget)
            .unwrap()
    }

    fn synthetic(n: usize, batch: usize, seed: u64) -> Vec<Instance> {
        let config = SynthConfig {
            n_nodes: n,
            ..SynthConfig::default()
        };
        let mut gen = SyntheticGenerator::new(config, seed);
        (0..batch).map(|_| gen.instance().unwrap()).collect()
    }

    #[test]
    fn greedy_is_deterministic() {
        let instances = synthetic(12, 4, 7);
        let controller = RolloutController::new(DecodeMode::Greedy, RLConfig::default());
        let run = || {
            let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
            let mut policy = LinearPolicy::default();
            let mut rng = StdRng::seed_from_u64(0);
            controller
                .run(&mut env, &mut policy, &mut rng, None)
                .unwrap()
                .trajectories
                .iter()
                .map(Trajectory::actions)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn sampling_is_reproducible_for_a_seed() {
        let instances = synthetic(10, 3, 11);
        let controller = RolloutController::new(DecodeMode::Sample, RLConfig::default());
        let run = |seed| {
            let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            controller
                .run(&mut env, &mut LinearPolicy::default(), &mut rng, None)
                .unwrap()
                .trajectories
                .iter()
                .map(Trajectory::actions)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn full_teacher_ratio_reproduces_tour() {
        let instances = vec![triangle(10.0), triangle(10.0)];
        let tours = vec![vec![0, 1, 0], vec![0, 2, 0]];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let controller = RolloutController::new(
            DecodeMode::MixedTeacherForcing { ratio: 1.0 },
            RLConfig::default(),
        );
        let mut rng = StdRng::seed_from_u64(3);
        let rollout = controller
            .run(&mut env, &mut RandomPolicy::new(1), &mut rng, Some(&tours))
            .unwrap();

        for (traj, tour) in rollout.trajectories.iter().zip(&tours) {
            assert_eq!(traj.tour(), tour.as_slice());
            assert!(traj.steps.iter().filter(|s| s.active).all(|s| s.followed_teacher));
        }
        assert!(!rollout.truncated);
    }

    #[test]
    fn half_teacher_ratio_mixes_and_is_seeded() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64 * 0.1, 0.0)).collect();
        let instances: Vec<Instance> = (0..20)
            .map(|_| Instance::from_points(&points, &[1.0; 10], 100.0).unwrap())
            .collect();
        let tour: Vec<usize> = std::iter::once(0).chain((1..10).rev()).chain([0]).collect();
        let tours = vec![tour; instances.len()];
        let controller = RolloutController::new(
            DecodeMode::MixedTeacherForcing { ratio: 0.5 },
            RLConfig::default(),
        );
        let run = |seed| {
            let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            controller
                .run(&mut env, &mut GainDensityPolicy::default(), &mut rng, Some(&tours))
                .unwrap()
        };

        let first = run(8);
        let flags: Vec<bool> = first
            .trajectories
            .iter()
            .flat_map(|t| t.steps.iter().filter(|s| s.active).map(|s| s.followed_teacher))
            .collect();
        assert!(flags.iter().any(|&f| f));
        assert!(flags.iter().any(|&f| !f));

        let second = run(8);
        for (a, b) in first.trajectories.iter().zip(&second.trajectories) {
            assert_eq!(a.actions(), b.actions());
            assert_eq!(a.steps, b.steps);
        }
    }

    #[test]
    fn demonstration_resumes_from_episode_progress() {
        let instances = vec![triangle(10.0)];
        let tours = vec![vec![0, 1, 0]];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        env.step(&[1]).unwrap();
        let controller = RolloutController::new(DecodeMode::TeacherForced, RLConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let rollout = controller
            .run(&mut env, &mut RandomPolicy::new(0), &mut rng, Some(&tours))
            .unwrap();
        assert_eq!(rollout.ticks, 1);
        assert_eq!(rollout.trajectories[0].tour(), &[0, 1, 0]);
    }

    #[test]
    fn teacher_mode_requires_demonstrations() {
        let instances = vec![triangle(10.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let controller = RolloutController::new(
            DecodeMode::MixedTeacherForcing { ratio: 0.3 },
            RLConfig::default(),
        );
        let mut rng = StdRng::seed_from_u64(0);
        let err = controller
            .run(&mut env, &mut RandomPolicy::new(0), &mut rng, None)
            .unwrap_err();
        assert!(matches!(err, RouterError::MissingDemonstrations { .. }));
    }

    #[test]
    fn exhausted_tour_forces_depot() {
        let instances = vec![triangle(10.0)];
        let tours = vec![vec![0, 1]];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let controller = RolloutController::new(DecodeMode::TeacherForced, RLConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let rollout = controller
            .run(&mut env, &mut RandomPolicy::new(0), &mut rng, Some(&tours))
            .unwrap();
        assert_eq!(rollout.trajectories[0].tour(), &[0, 1, 0]);
    }

    #[test]
    fn terminates_within_node_count_plus_margin() {
        let instances = synthetic(15, 8, 21);
        let n = instances[0].n_nodes();
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let controller = RolloutController::new(DecodeMode::Sample, RLConfig::default());
        let mut rng = StdRng::seed_from_u64(9);
        let rollout = controller
            .run(&mut env, &mut RandomPolicy::new(4), &mut rng, None)
            .unwrap();
        assert!(rollout.ticks <= n + 5);
        assert_eq!(rollout.batch_size(), 8);
        for traj in &rollout.trajectories {
            assert_eq!(traj.steps.len(), rollout.ticks);
        }
    }

    #[test]
    fn finished_episodes_keep_placeholder_records() {
        let instances = vec![triangle(0.0), triangle(10.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let controller = RolloutController::new(DecodeMode::Greedy, RLConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let rollout = controller
            .run(&mut env, &mut GainDensityPolicy::default(), &mut rng, None)
            .unwrap();

        let done_early = &rollout.trajectories[0];
        assert_eq!(done_early.n_active_steps(), 1);
        assert_eq!(done_early.steps.len(), rollout.ticks);
        assert!(done_early.steps[1..].iter().all(|s| !s.active));
        assert_eq!(done_early.final_state.tour_length(), 0.0);
    }

    #[test]
    fn zero_budget_ends_in_one_tick() {
        let instances = vec![triangle(0.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let controller = RolloutController::new(DecodeMode::Greedy, RLConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let rollout = controller
            .run(&mut env, &mut RandomPolicy::new(2), &mut rng, None)
            .unwrap();
        assert_eq!(rollout.ticks, 1);
        assert_eq!(rollout.trajectories[0].actions(), vec![DEPOT]);
        assert_eq!(rollout.trajectories[0].final_state.tour_length(), 0.0);
    }

    #[test]
    fn zero_cap_yields_empty_rollout() {
        let instances = vec![triangle(10.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let controller =
            RolloutController::new(DecodeMode::Greedy, RLConfig::default()).with_max_steps(0);
        let mut rng = StdRng::seed_from_u64(0);
        let rollout = controller
            .run(&mut env, &mut RandomPolicy::new(2), &mut rng, None)
            .unwrap();
        assert!(rollout.is_empty());
        assert!(rollout.trajectories[0].steps.is_empty());
        assert_eq!(rollout.trajectories[0].mean_value(), 0.0);
    }

    #[test]
    fn small_cap_truncates_without_error() {
        let instances = synthetic(20, 2, 5);
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let controller =
            RolloutController::new(DecodeMode::Greedy, RLConfig::default()).with_max_steps(1);
        let mut rng = StdRng::seed_from_u64(0);
        let rollout = controller
            .run(&mut env, &mut GainDensityPolicy::default(), &mut rng, None)
            .unwrap();
        assert_eq!(rollout.ticks, 1);
        assert!(rollout.truncated);
    }

    #[test]
    fn demonstration_count_must_match_batch() {
        let instances = vec![triangle(10.0)];
        let mut env = RoutingEnvironment::new(&instances, RLConfig::default()).unwrap();
        let controller = RolloutController::new(DecodeMode::TeacherForced, RLConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let tours = vec![vec![0, 1, 0], vec![0, 2, 0]];
        let err = controller
            .run(&mut env, &mut RandomPolicy::new(0), &mut rng, Some(&tours))
            .unwrap_err();
        assert!(matches!(err, RouterError::Shape(_)));
    }
}
