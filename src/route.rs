//! Finished depot-rooted routes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::instance::{Instance, DEPOT};
use crate::Id;

/// A depot-rooted walk over one instance with its coverage and cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Id of the instance the route was computed for.
    pub instance_id: Id,
    /// Visited nodes in order, starting at the depot.
    pub tour: Vec<usize>,
    pub covered_value: f64,
    /// `covered_value / total_packets`.
    pub coverage_fraction: f64,
    pub tour_length: f64,
    /// Whether the walk ends back at the depot.
    pub returned: bool,
}

impl Route {
    /// Replays `tour` on `instance` and measures it.
    ///
    /// Budget feasibility is not enforced here; use [`Route::within_budget`].
    pub fn evaluate(instance: &Instance, tour: &[usize]) -> Result<Self, ValidationError> {
        let n = instance.n_nodes();
        if tour.first() != Some(&DEPOT) {
            return Err(ValidationError::TourNotDepotRooted);
        }
        if let Some(&index) = tour.iter().find(|&&i| i >= n) {
            return Err(ValidationError::TourOutOfRange { index, nodes: n });
        }

        let mut covered = vec![false; n];
        for &node in tour {
            for (j, c) in covered.iter_mut().enumerate() {
                if instance.covers(node, j) {
                    *c = true;
                }
            }
        }
        let covered_value: f64 = covered
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c)
            .map(|(j, _)| instance.packet(j))
            .sum();
        let tour_length = tour
            .windows(2)
            .map(|w| instance.distance(w[0], w[1]))
            .sum();
        let total = instance.total_packets();

        Ok(Self {
            instance_id: instance.id.clone(),
            tour: tour.to_vec(),
            covered_value,
            coverage_fraction: if total > 0.0 { covered_value / total } else { 0.0 },
            tour_length,
            returned: tour.len() > 1 && tour.last() == Some(&DEPOT),
        })
    }

    /// Number of non-depot stops.
    pub fn n_visits(&self) -> usize {
        self.tour.iter().filter(|&&i| i != DEPOT).count()
    }

    /// True when the walk returned to the depot within `budget` (with `tolerance`).
    pub fn within_budget(&self, budget: f64, tolerance: f64) -> bool {
        self.returned && self.tour_length <= budget + tolerance
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stops: Vec<String> = self.tour.iter().map(|i| i.to_string()).collect();
        write!(
            f,
            "{} | covered {:.2} ({:.1}%) | length {:.3}{}",
            stops.join(" -> "),
            self.covered_value,
            self.coverage_fraction * 100.0,
            self.tour_length,
            if self.returned { "" } else { " | open" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Instance {
        Instance::from_points(&[(0.0, 0.0), (3.0, 0.0), (0.0, 4.0)], &[0.0, 5.0, 7.0], 10.0)
            .unwrap()
    }

    #[test]
    fn evaluates_closed_tour() {
        let inst = triangle();
        let route = Route::evaluate(&inst, &[0, 1, 2, 0]).unwrap();
        assert!((route.tour_length - 12.0).abs() < 1e-9);
        assert_eq!(route.covered_value, 12.0);
        assert!(route.returned);
        assert_eq!(route.n_visits(), 2);
        // 3 + 5 + 4 > 10
        assert!(!route.within_budget(inst.budget(), 1e-9));
    }

    #[test]
    fn depot_only_tour_is_not_a_return() {
        let route = Route::evaluate(&triangle(), &[0]).unwrap();
        assert!(!route.returned);
        assert_eq!(route.tour_length, 0.0);
        assert_eq!(route.covered_value, 0.0);
    }

    #[test]
    fn rejects_bad_tours() {
        let inst = triangle();
        assert_eq!(
            Route::evaluate(&inst, &[1, 0]).unwrap_err(),
            ValidationError::TourNotDepotRooted
        );
        assert_eq!(
            Route::evaluate(&inst, &[0, 9]).unwrap_err(),
            ValidationError::TourOutOfRange { index: 9, nodes: 3 }
        );
    }

    #[test]
    fn display_lists_stops() {
        let route = Route::evaluate(&triangle(), &[0, 2, 0]).unwrap();
        let text = route.to_string();
        assert!(text.starts_with("0 -> 2 -> 0"));
        assert!(!text.contains("open"));
    }
}
