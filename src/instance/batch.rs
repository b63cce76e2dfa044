//! Uniform-size batches of instances.

use super::problem::Instance;
use super::record::{DemoSource, InstanceRecord};
use crate::error::{RouterError, ShapeError};

/// A batch of instances sharing the same node count.
///
/// Teacher tours keep their own lengths; nothing is truncated to the shortest.
#[derive(Debug, Clone)]
pub struct InstanceBatch {
    instances: Vec<Instance>,
    tours: Vec<Vec<usize>>,
    sources: Vec<DemoSource>,
}

impl InstanceBatch {
    /// Builds a batch without demonstrations.
    pub fn new(instances: Vec<Instance>) -> Result<Self, ShapeError> {
        let b = instances.len();
        Self::with_demonstrations(instances, vec![vec![0]; b], vec![DemoSource::default(); b])
    }

    /// Builds a batch with one teacher tour and source label per instance.
    pub fn with_demonstrations(
        instances: Vec<Instance>,
        tours: Vec<Vec<usize>>,
        sources: Vec<DemoSource>,
    ) -> Result<Self, ShapeError> {
        check_uniform(&instances)?;
        if tours.len() != instances.len() {
            return Err(ShapeError::LengthMismatch {
                what: "tours",
                expected: instances.len(),
                found: tours.len(),
            });
        }
        if sources.len() != instances.len() {
            return Err(ShapeError::LengthMismatch {
                what: "sources",
                expected: instances.len(),
                found: sources.len(),
            });
        }
        Ok(Self {
            instances,
            tours,
            sources,
        })
    }

    /// Collates validated records into a batch.
    pub fn from_records(records: &[InstanceRecord]) -> Result<Self, RouterError> {
        let instances = records
            .iter()
            .map(InstanceRecord::to_instance)
            .collect::<Result<Vec<_>, _>>()?;
        let tours = records.iter().map(|r| r.tour.clone()).collect();
        let sources = records.iter().map(|r| r.source).collect();
        Ok(Self::with_demonstrations(instances, tours, sources)?)
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn tours(&self) -> &[Vec<usize>] {
        &self.tours
    }

    pub fn sources(&self) -> &[DemoSource] {
        &self.sources
    }

    /// Number of episodes (B).
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Shared node count (N).
    pub fn n_nodes(&self) -> usize {
        self.instances.first().map_or(0, Instance::n_nodes)
    }
}

/// Ensures a non-empty batch with a uniform node count.
pub fn check_uniform(instances: &[Instance]) -> Result<usize, ShapeError> {
    let first = instances.first().ok_or(ShapeError::EmptyBatch)?;
    let n = first.n_nodes();
    for (episode, inst) in instances.iter().enumerate() {
        if inst.n_nodes() != n {
            return Err(ShapeError::NodeCountMismatch {
                episode,
                expected: n,
                found: inst.n_nodes(),
            });
        }
    }
    Ok(n)
}
