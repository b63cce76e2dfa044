//! Learned routing for the budget-constrained covering salesman problem.
//!
//! The core is a batched lock-step environment ([`RoutingEnvironment`]) driven
//! by a [`RolloutController`]: every tick computes feasibility masks and
//! marginal gains, queries a [`Policy`] once for the whole batch, decodes one
//! action per active episode, and steps the environment. Finished rollouts
//! feed the [`RewardComputer`], the training losses, and [`EvaluationMetrics`].
//!
//! The [`PolicyRouter`] bridges a policy to the
//! [`RoutingAlgorithm`](crate::algorithms::RoutingAlgorithm) trait.

pub mod config;
pub mod decoder;
pub mod environment;
pub mod episode;
pub mod metrics;
pub mod observation;
pub mod policy;
pub mod reward;
pub mod rollout;
pub mod router;
pub mod training;
pub mod types;

pub use config::{RLConfig, TrainingConfig};
pub use decoder::{Decision, Decoder};
pub use environment::{RoutingEnvironment, StepResult};
pub use episode::EpisodeState;
pub use metrics::EvaluationMetrics;
pub use observation::{Observation, StateSnapshot, DYNAMIC_FEATURE_DIM};
pub use policy::{GainDensityPolicy, LinearPolicy, Policy, PolicyOutput, RandomPolicy};
pub use reward::RewardComputer;
pub use rollout::{Rollout, RolloutController, StepRecord, Trajectory};
pub use router::PolicyRouter;
pub use training::{ImitationLoss, PolicyGradientLoss, TrainStats, Trainer};
pub use types::{ActionMask, DecodeMode, EpisodeStatus};
