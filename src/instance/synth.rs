//! Random instance generation for smoke tests and training.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::batch::InstanceBatch;
use super::problem::Instance;
use super::types::{NodeFeatures, Position};
use crate::error::{RouterError, ValidationError};

/// Parameters for synthetic instances.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// Nodes per instance, depot included.
    pub n_nodes: usize,
    /// Mean coverage radius.
    pub radius: f64,
    /// Standard deviation of the per-node radius jitter.
    pub radius_jitter: f64,
    /// Radius clamp `[min, max]`.
    pub radius_bounds: (f64, f64),
    /// Inclusive integer packet range for non-depot nodes.
    pub packet_range: (u32, u32),
    /// Budget as a fraction of `0.7 × sqrt(N)`.
    pub budget_scale: f64,
    /// Derive coverage from radii; otherwise visiting equals collecting.
    pub with_cover: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            n_nodes: 30,
            radius: 0.15,
            radius_jitter: 0.03,
            radius_bounds: (0.05, 0.4),
            packet_range: (1, 5),
            budget_scale: 0.9,
            with_cover: true,
        }
    }
}

impl SynthConfig {
    /// Budget shared by every generated instance.
    pub fn budget(&self) -> f64 {
        self.budget_scale * 0.7 * (self.n_nodes as f64).sqrt()
    }
}

/// Seeded generator of uniform random instances with the depot at the centre.
#[derive(Debug)]
pub struct SyntheticGenerator {
    config: SynthConfig,
    rng: StdRng,
}

impl SyntheticGenerator {
    pub fn new(config: SynthConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Generates one instance.
    ///
    /// # Errors
    ///
    /// [`ValidationError::RadiusDistribution`] when the radius jitter is
    /// negative or not finite.
    pub fn instance(&mut self) -> Result<Instance, ValidationError> {
        let cfg = &self.config;
        let radius = Normal::new(cfg.radius, cfg.radius_jitter)?;
        let n = cfg.n_nodes.max(1);
        let (lo, hi) = cfg.radius_bounds;
        let (pmin, pmax) = (cfg.packet_range.0, cfg.packet_range.1.max(cfg.packet_range.0));
        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let position = if i == 0 {
                Position::new(0.5, 0.5)
            } else {
                Position::new(self.rng.gen::<f64>(), self.rng.gen::<f64>())
            };
            let packet = if i == 0 {
                0.0
            } else {
                self.rng.gen_range(pmin..=pmax) as f64
            };
            let radius = if cfg.with_cover {
                radius.sample(&mut self.rng).clamp(lo, hi)
            } else {
                0.0
            };
            nodes.push(NodeFeatures::new(position, packet, radius));
        }
        let instance = Instance::new(nodes, None, cfg.budget())?;
        Ok(if cfg.with_cover {
            instance.with_radius_coverage()
        } else {
            instance
        })
    }

    /// Generates a batch of `batch_size` instances.
    pub fn batch(&mut self, batch_size: usize) -> Result<InstanceBatch, RouterError> {
        let instances = (0..batch_size)
            .map(|_| self.instance())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InstanceBatch::new(instances)?)
    }
}
