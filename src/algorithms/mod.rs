pub mod rl;

pub use rl::PolicyRouter;

use crate::error::RouterError;
use crate::instance::Instance;
use crate::route::Route;

/// Algorithm computing a depot-rooted route for a single instance.
pub trait RoutingAlgorithm {
    /// Routes one instance.
    ///
    /// # Arguments
    ///
    /// * `instance` - The problem to solve, including its travel budget
    ///
    /// # Returns
    ///
    /// A [`Route`] that starts at the depot and respects the budget
    fn route(&mut self, instance: &Instance) -> Result<Route, RouterError>;

    /// Routes every instance in turn.
    fn route_all(&mut self, instances: &[Instance]) -> Result<Vec<Route>, RouterError> {
        instances.iter().map(|inst| self.route(inst)).collect()
    }
}
