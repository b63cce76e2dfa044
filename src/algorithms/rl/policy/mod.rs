//! Policy trait and implementations.

pub mod heuristic;
pub mod linear;
pub mod random;
pub mod trait_;

pub use heuristic::GainDensityPolicy;
pub use linear::{LinearPolicy, StepGradient};
pub use random::RandomPolicy;
pub use trait_::{Policy, PolicyOutput};
