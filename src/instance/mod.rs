//! Problem instances: geometry, coverage, budgets, and their persisted form.

pub mod batch;
pub mod problem;
pub mod record;
pub mod synth;
pub mod types;

pub use batch::InstanceBatch;
pub use problem::{Instance, DEPOT};
pub use record::{load_jsonl, read_jsonl, write_jsonl, DemoSource, InstanceRecord};
pub use synth::{SynthConfig, SyntheticGenerator};
pub use types::{NodeFeatures, Position, NODE_FEATURE_DIM};
