//! Training: policy-gradient and imitation losses, optimizer, and trainer.

pub mod imitation;
pub mod loss;
pub mod optim;
pub mod trainer;

pub use imitation::ImitationLoss;
pub use loss::PolicyGradientLoss;
pub use optim::{clip_grad_norm, Adam};
pub use trainer::{TrainStats, Trainer};
