//! Policy-driven routing behind the [`RoutingAlgorithm`] interface.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::config::RLConfig;
use super::environment::RoutingEnvironment;
use super::policy::Policy;
use super::rollout::RolloutController;
use super::types::DecodeMode;
use crate::algorithms::RoutingAlgorithm;
use crate::error::RouterError;
use crate::instance::Instance;
use crate::route::Route;

/// Routes single instances by rolling out a policy.
///
/// Greedy by default; with [`DecodeMode::Sample`] every call draws from a
/// generator seeded once at construction, so a sequence of calls is
/// reproducible.
///
/// ```ignore
/// use covroute::algorithms::{PolicyRouter, RoutingAlgorithm};
/// use covroute::algorithms::rl::GainDensityPolicy;
///
/// let mut router = PolicyRouter::new(GainDensityPolicy::default());
/// let route = router.route(&instance)?;
/// ```
pub struct PolicyRouter<P: Policy> {
    policy: P,
    controller: RolloutController,
    rng: StdRng,
}

impl<P: Policy> PolicyRouter<P> {
    /// Greedy router with default configuration.
    pub fn new(policy: P) -> Self {
        Self::with_mode(policy, DecodeMode::Greedy, RLConfig::default(), 0)
    }

    pub fn with_mode(policy: P, mode: DecodeMode, config: RLConfig, seed: u64) -> Self {
        Self {
            policy,
            controller: RolloutController::new(mode, config),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn into_policy(self) -> P {
        self.policy
    }
}

impl<P: Policy> RoutingAlgorithm for PolicyRouter<P> {
    fn route(&mut self, instance: &Instance) -> Result<Route, RouterError> {
        let instances = std::slice::from_ref(instance);
        let mut env = RoutingEnvironment::new(instances, self.controller.config.clone())?;
        let rollout = self
            .controller
            .run(&mut env, &mut self.policy, &mut self.rng, None)?;
        let tour = env.episode(0).path();
        if rollout.truncated {
            log::warn!(
                "Route for instance {} was truncated after {} ticks",
                instance.id,
                rollout.ticks
            );
        }
        Ok(Route::evaluate(instance, tour)?)
    }
}
