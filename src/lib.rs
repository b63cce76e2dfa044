//! covroute - batched simulation and learned decoding for the
//! Budget-Constrained Covering Salesman Problem (BCCSP).
//!
//! An agent leaves a depot, visits nodes to cover packet demand, and must be
//! able to return within a travel budget. The crate provides the instance
//! model and dataset records, a lock-step batched environment, masked
//! decoding, rollouts, rewards, and policy-gradient / imitation training.

pub mod algorithms;
pub mod error;
pub mod instance;
pub mod route;

pub use error::{RouterError, ShapeError, ValidationError};
pub use route::Route;

/// Identifier type used for instances and routes.
pub type Id = String;

/// Generates a new unique identifier (UUID v4).
pub fn generate_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}
