//! Per-episode mutable state.

use super::types::EpisodeStatus;
use crate::instance::{Instance, DEPOT};

/// State of one episode in a batch.
///
/// Only the environment mutates it. `visited` and `covered` only grow,
/// `remaining_budget` never increases, and `tour_length` never decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeState {
    visited: Vec<bool>,
    covered: Vec<bool>,
    current_node: usize,
    budget: f64,
    remaining_budget: f64,
    tour_length: f64,
    last_move_distance: f64,
    status: EpisodeStatus,
    path: Vec<usize>,
}

impl EpisodeState {
    /// Fresh episode at the depot: only the depot itself is visited and covered.
    pub(crate) fn start(instance: &Instance, budget: f64) -> Self {
        let n = instance.n_nodes();
        let mut state = Self {
            visited: vec![false; n],
            covered: vec![false; n],
            current_node: DEPOT,
            budget,
            remaining_budget: budget,
            tour_length: 0.0,
            last_move_distance: 0.0,
            status: EpisodeStatus::Active,
            path: vec![DEPOT],
        };
        state.visited[DEPOT] = true;
        state.covered[DEPOT] = true;
        state
    }

    /// Moves to `action`, paying the travel cost and covering its demand.
    ///
    /// Returns the distance travelled. Terminated episodes are left untouched.
    pub(crate) fn advance(&mut self, instance: &Instance, action: usize, budget_epsilon: f64) -> f64 {
        if !self.status.is_active() {
            return 0.0;
        }
        let d = instance.distance(self.current_node, action);
        self.tour_length += d;
        self.remaining_budget -= d;
        self.last_move_distance = d;
        self.current_node = action;
        self.visited[action] = true;
        self.path.push(action);
        self.absorb_coverage(instance, action);
        if action == DEPOT || self.remaining_budget < budget_epsilon {
            self.status = EpisodeStatus::Terminated;
        }
        d
    }

    fn absorb_coverage(&mut self, instance: &Instance, node: usize) {
        for (j, covered) in self.covered.iter_mut().enumerate() {
            if instance.covers(node, j) {
                *covered = true;
            }
        }
    }

    pub fn visited(&self) -> &[bool] {
        &self.visited
    }

    pub fn covered(&self) -> &[bool] {
        &self.covered
    }

    pub fn is_visited(&self, node: usize) -> bool {
        self.visited[node]
    }

    pub fn is_covered(&self, node: usize) -> bool {
        self.covered[node]
    }

    pub fn current_node(&self) -> usize {
        self.current_node
    }

    /// Budget the episode was reset with.
    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn remaining_budget(&self) -> f64 {
        self.remaining_budget
    }

    pub fn tour_length(&self) -> f64 {
        self.tour_length
    }

    pub fn last_move_distance(&self) -> f64 {
        self.last_move_distance
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Nodes in the order they were entered, starting with the depot.
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Number of moves made so far.
    pub fn n_moves(&self) -> usize {
        self.path.len() - 1
    }

    /// True when the agent currently stands at the depot.
    pub fn at_depot(&self) -> bool {
        self.current_node == DEPOT
    }

    /// Total packet value of covered nodes.
    pub fn covered_value(&self, instance: &Instance) -> f64 {
        self.covered
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c)
            .map(|(j, _)| instance.packet(j))
            .sum()
    }

    /// Fraction of nodes (by count) that are covered.
    pub fn covered_fraction(&self) -> f64 {
        let n = self.covered.len();
        if n == 0 {
            return 0.0;
        }
        self.covered.iter().filter(|&&c| c).count() as f64 / n as f64
    }

    /// `remaining_budget / budget`, guarded against a zero budget.
    pub fn remaining_fraction(&self, epsilon: f64) -> f64 {
        self.remaining_budget / (self.budget + epsilon)
    }

    /// `tour_length / budget`, guarded against a zero budget.
    pub fn tour_fraction(&self, epsilon: f64) -> f64 {
        self.tour_length / (self.budget + epsilon)
    }
}
