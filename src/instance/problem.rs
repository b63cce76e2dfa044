//! Immutable per-episode problem description.

use log::debug;

use super::types::{NodeFeatures, Position};
use crate::error::ValidationError;
use crate::{generate_id, Id};

/// Index of the depot in every instance.
pub const DEPOT: usize = 0;

/// Which demand nodes are covered when a node is visited.
#[derive(Debug, Clone, PartialEq)]
enum Coverage {
    /// Visiting a node covers exactly that node.
    Identity,
    /// Row-major `n × n` relation: `cells[i * n + j]` means visiting `i` covers `j`.
    Matrix(Vec<bool>),
}

/// A Budget-Constrained Covering Salesman instance.
///
/// Holds node features, the coverage relation, and the travel budget. The full
/// pairwise distance matrix is computed once at construction; every feasibility
/// and cost computation reads from it.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Identifier used in logs.
    pub id: Id,
    nodes: Vec<NodeFeatures>,
    coverage: Coverage,
    distances: Vec<f64>,
    budget: f64,
}

impl Instance {
    /// Builds an instance from node features, an optional coverage matrix, and a budget.
    ///
    /// `cover = None` means identity coverage. The depot's packet value is forced
    /// to zero so it never contributes to the objective.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for empty instances, non-finite or negative
    /// values, a negative budget, or a coverage matrix of the wrong shape.
    pub fn new(
        mut nodes: Vec<NodeFeatures>,
        cover: Option<Vec<Vec<bool>>>,
        budget: f64,
    ) -> Result<Self, ValidationError> {
        if nodes.is_empty() {
            return Err(ValidationError::EmptyInstance);
        }
        if !budget.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "budget" });
        }
        if budget < 0.0 {
            return Err(ValidationError::NegativeBudget(budget));
        }
        for (i, node) in nodes.iter().enumerate() {
            let values = node.as_array();
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ValidationError::NonFiniteValue { field: "nodes" });
            }
            if node.packet < 0.0 {
                return Err(ValidationError::NegativePacket {
                    node: i,
                    value: node.packet,
                });
            }
        }
        if nodes[DEPOT].packet != 0.0 {
            debug!(
                "zeroing depot packet value {} (depot never contributes demand)",
                nodes[DEPOT].packet
            );
            nodes[DEPOT].packet = 0.0;
        }

        let n = nodes.len();
        let coverage = match cover {
            None => Coverage::Identity,
            Some(rows) => {
                if rows.len() != n {
                    return Err(ValidationError::CoverSizeMismatch {
                        nodes: n,
                        cover: rows.len(),
                    });
                }
                let mut cells = Vec::with_capacity(n * n);
                for (row, entries) in rows.iter().enumerate() {
                    if entries.len() != n {
                        return Err(ValidationError::NonSquareCover {
                            rows: n,
                            row,
                            len: entries.len(),
                        });
                    }
                    cells.extend_from_slice(entries);
                }
                clear_depot_row(&mut cells, n);
                Coverage::Matrix(cells)
            }
        };

        let distances = pairwise_distances(&nodes);

        Ok(Self {
            id: generate_id(),
            nodes,
            coverage,
            distances,
            budget,
        })
    }

    /// Convenience constructor with identity coverage and zero radii.
    pub fn from_points(
        points: &[(f64, f64)],
        packets: &[f64],
        budget: f64,
    ) -> Result<Self, ValidationError> {
        if points.len() != packets.len() {
            return Err(ValidationError::WrongFeatureArity {
                node: points.len().min(packets.len()),
                expected: points.len(),
                found: packets.len(),
            });
        }
        let nodes = points
            .iter()
            .zip(packets)
            .map(|(&(x, y), &p)| NodeFeatures::new(Position::new(x, y), p, 0.0))
            .collect();
        Self::new(nodes, None, budget)
    }

    /// Replaces the coverage relation with one derived from node radii:
    /// `i` covers `j` iff `d(i, j) <= radius_i`. Nothing covers the depot and
    /// the depot covers nothing else.
    pub fn with_radius_coverage(mut self) -> Self {
        let n = self.n_nodes();
        let mut cells = vec![false; n * n];
        for i in 0..n {
            let r = self.nodes[i].radius;
            for j in 0..n {
                cells[i * n + j] = j != DEPOT && (i == j || self.distance(i, j) <= r);
            }
        }
        clear_depot_row(&mut cells, n);
        self.coverage = Coverage::Matrix(cells);
        self
    }

    /// Number of nodes, depot included.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Full travel budget, including the return trip.
    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn nodes(&self) -> &[NodeFeatures] {
        &self.nodes
    }

    pub fn packet(&self, node: usize) -> f64 {
        self.nodes[node].packet
    }

    /// Sum of all packet values.
    pub fn total_packets(&self) -> f64 {
        self.nodes.iter().map(|n| n.packet).sum()
    }

    /// Precomputed Euclidean distance between two nodes.
    #[inline]
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances[from * self.nodes.len() + to]
    }

    /// Distances from `from` to every node.
    pub fn distance_row(&self, from: usize) -> &[f64] {
        let n = self.nodes.len();
        &self.distances[from * n..(from + 1) * n]
    }

    /// Whether visiting `visited` covers the demand at `demand`.
    #[inline]
    pub fn covers(&self, visited: usize, demand: usize) -> bool {
        match &self.coverage {
            Coverage::Identity => visited == demand,
            Coverage::Matrix(cells) => cells[visited * self.nodes.len() + demand],
        }
    }

    /// True when coverage is the identity relation.
    pub fn has_identity_coverage(&self) -> bool {
        matches!(self.coverage, Coverage::Identity)
    }

    /// The explicit coverage matrix, or `None` for identity coverage.
    pub fn cover_matrix(&self) -> Option<Vec<Vec<bool>>> {
        match &self.coverage {
            Coverage::Identity => None,
            Coverage::Matrix(cells) => Some(
                cells
                    .chunks(self.nodes.len())
                    .map(|row| row.to_vec())
                    .collect(),
            ),
        }
    }
}

/// Standing at the depot is free, so its row must not cover any demand.
fn clear_depot_row(cells: &mut [bool], n: usize) {
    let row = &mut cells[DEPOT * n..(DEPOT + 1) * n];
    if row.iter().enumerate().any(|(j, &c)| c && j != DEPOT) {
        debug!("clearing depot coverage row");
    }
    row.fill(false);
}

fn pairwise_distances(nodes: &[NodeFeatures]) -> Vec<f64> {
    let n = nodes.len();
    let mut d = vec![0.0; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let dist = nodes[i].position.distance_to(&nodes[j].position);
            d[i * n + j] = dist;
            d[j * n + i] = dist;
        }
    }
    d
}
