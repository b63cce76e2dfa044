//! JSONL training/evaluation records.
//!
//! One record per line:
//!
//! ```text
//! {"nodes": [[x, y, packet, radius], ...], "cover": null | [[0,1,..],..],
//!  "budget": 1.7, "tour": [0, 3, 1, 0], "source": "ILP"}
//! ```

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::problem::{Instance, DEPOT};
use super::types::{NodeFeatures, Position, NODE_FEATURE_DIM};
use crate::error::{RouterError, ValidationError};

/// Origin of a teacher demonstration, used to weight imitation losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DemoSource {
    /// Produced by an exact (integer-programming) solver.
    Exact,
    /// Produced by a heuristic.
    #[default]
    Heuristic,
}

impl DemoSource {
    /// Parses a source label. `"ILP"` (any case) is exact, everything else heuristic.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("ilp") {
            DemoSource::Exact
        } else {
            DemoSource::Heuristic
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DemoSource::Exact => "ILP",
            DemoSource::Heuristic => "PCA",
        }
    }
}

impl fmt::Display for DemoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DemoSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for DemoSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(DemoSource::from_label(&label))
    }
}

fn default_tour() -> Vec<usize> {
    vec![DEPOT]
}

/// A persisted instance, optionally with a teacher tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Per-node `[x, y, packet_value, coverage_radius]`; index 0 is the depot.
    pub nodes: Vec<Vec<f64>>,
    /// Explicit 0/1 coverage matrix, or `null` for identity coverage.
    #[serde(default)]
    pub cover: Option<Vec<Vec<f64>>>,
    /// Travel budget in normalized distance units.
    #[serde(default)]
    pub budget: Option<f64>,
    /// Teacher demonstration starting (and normally ending) at the depot.
    #[serde(default = "default_tour")]
    pub tour: Vec<usize>,
    #[serde(default)]
    pub source: DemoSource,
}

impl InstanceRecord {
    /// Checks arity, budget, coverage shape, and tour indices.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let n = self.nodes.len();
        if n == 0 {
            return Err(ValidationError::EmptyInstance);
        }
        for (node, features) in self.nodes.iter().enumerate() {
            if features.len() != NODE_FEATURE_DIM {
                return Err(ValidationError::WrongFeatureArity {
                    node,
                    expected: NODE_FEATURE_DIM,
                    found: features.len(),
                });
            }
        }
        let budget = self.budget.ok_or(ValidationError::MissingBudget)?;
        if !budget.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "budget" });
        }
        if budget < 0.0 {
            return Err(ValidationError::NegativeBudget(budget));
        }
        if let Some(cover) = &self.cover {
            if cover.len() != n {
                return Err(ValidationError::CoverSizeMismatch {
                    nodes: n,
                    cover: cover.len(),
                });
            }
            for (row, entries) in cover.iter().enumerate() {
                if entries.len() != n {
                    return Err(ValidationError::NonSquareCover {
                        rows: n,
                        row,
                        len: entries.len(),
                    });
                }
                if let Some((col, &value)) = entries
                    .iter()
                    .enumerate()
                    .find(|&(_, &v)| v != 0.0 && v != 1.0)
                {
                    return Err(ValidationError::NonBinaryCover { row, col, value });
                }
            }
        }
        if let Some(&first) = self.tour.first() {
            if first != DEPOT {
                return Err(ValidationError::TourNotDepotRooted);
            }
        }
        if let Some(&index) = self.tour.iter().find(|&&i| i >= n) {
            return Err(ValidationError::TourOutOfRange { index, nodes: n });
        }
        Ok(())
    }

    /// Validates the record and builds its [`Instance`].
    pub fn to_instance(&self) -> Result<Instance, ValidationError> {
        self.validate()?;
        let nodes = self
            .nodes
            .iter()
            .map(|f| NodeFeatures::new(Position::new(f[0], f[1]), f[2], f[3]))
            .collect();
        let cover = self.cover.as_ref().map(|rows| {
            rows.iter()
                .map(|row| row.iter().map(|&v| v > 0.0).collect())
                .collect()
        });
        let budget = self.budget.ok_or(ValidationError::MissingBudget)?;
        Instance::new(nodes, cover, budget)
    }

    /// Serializes an instance (and an optional demonstration) back into a record.
    pub fn from_instance(instance: &Instance, tour: Option<Vec<usize>>, source: DemoSource) -> Self {
        Self {
            nodes: instance
                .nodes()
                .iter()
                .map(|n| n.as_array().to_vec())
                .collect(),
            cover: instance.cover_matrix().map(|rows| {
                rows.iter()
                    .map(|row| row.iter().map(|&c| if c { 1.0 } else { 0.0 }).collect())
                    .collect()
            }),
            budget: Some(instance.budget()),
            tour: tour.unwrap_or_else(default_tour),
            source,
        }
    }

    /// True when the record carries a demonstration beyond the trivial `[0]`.
    pub fn has_demonstration(&self) -> bool {
        self.tour.len() > 1
    }
}

/// Reads records from any buffered reader, one JSON object per non-empty line.
///
/// Every record is validated; errors carry the 1-based line number.
pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Vec<InstanceRecord>, RouterError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: InstanceRecord = serde_json::from_str(trimmed)
            .map_err(|source| RouterError::Json {
                line: idx + 1,
                source,
            })?;
        record.validate().map_err(|source| RouterError::Record {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Loads and validates a JSONL dataset from disk.
pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Vec<InstanceRecord>, RouterError> {
    let file = File::open(path)?;
    read_jsonl(BufReader::new(file))
}

/// Serializes records as JSONL.
pub fn write_jsonl<W: std::io::Write>(
    mut writer: W,
    records: &[InstanceRecord],
) -> Result<(), RouterError> {
    for (idx, record) in records.iter().enumerate() {
        let line = serde_json::to_string(record).map_err(|source| RouterError::Json {
            line: idx + 1,
            source,
        })?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"{"nodes": [[0.5,0.5,0,0],[0.1,0.2,3,0],[0.9,0.8,2,0]], "cover": null, "budget": 2.0, "tour": [0,1,0], "source": "ilp"}"#;

    #[test]
    fn parses_a_full_record() {
        let records = read_jsonl(LINE.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.source, DemoSource::Exact);
        assert_eq!(rec.tour, vec![0, 1, 0]);
        let inst = rec.to_instance().unwrap();
        assert_eq!(inst.n_nodes(), 3);
        assert!(inst.has_identity_coverage());
        assert_eq!(inst.budget(), 2.0);
    }

    #[test]
    fn defaults_for_optional_fields() {
        let json = r#"{"nodes": [[0,0,0,0],[1,0,1,0]], "budget": 3.0}"#;
        let rec: InstanceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.tour, vec![0]);
        assert_eq!(rec.source, DemoSource::Heuristic);
        assert!(rec.cover.is_none());
        assert!(!rec.has_demonstration());
    }

    #[test]
    fn missing_budget_is_a_validation_error() {
        let json = r#"{"nodes": [[0,0,0,0],[1,0,1,0]]}"#;
        let err = read_jsonl(json.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            RouterError::Record {
                line: 1,
                source: ValidationError::MissingBudget
            }
        ));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let json = r#"{"nodes": [[0,0,0,0],[1,0,1]], "budget": 1.0}"#;
        let rec: InstanceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            rec.validate(),
            Err(ValidationError::WrongFeatureArity {
                node: 1,
                expected: 4,
                found: 3
            })
        );
    }

    #[test]
    fn non_square_cover_is_rejected() {
        let json = r#"{"nodes": [[0,0,0,0],[1,0,1,0]], "cover": [[1,0],[0]], "budget": 1.0}"#;
        let rec: InstanceRecord = serde_json::from_str(json).unwrap();
        assert!(matches!(
            rec.validate(),
            Err(ValidationError::NonSquareCover { row: 1, .. })
        ));
    }

    #[test]
    fn malformed_json_reports_line() {
        let text = format!("{}\n\n{{not json", LINE);
        let err = read_jsonl(text.as_bytes()).unwrap_err();
        assert!(matches!(err, RouterError::Json { line: 3, .. }));
    }

    #[test]
    fn explicit_cover_round_trips_through_instance() {
        let json = r#"{"nodes": [[0,0,0,0],[1,0,1,0],[2,0,1,0]], "cover": [[0,0,0],[0,1,1],[0,0,1]], "budget": 5.0}"#;
        let rec: InstanceRecord = serde_json::from_str(json).unwrap();
        let inst = rec.to_instance().unwrap();
        assert!(inst.covers(1, 2));
        let back = InstanceRecord::from_instance(&inst, None, DemoSource::Heuristic);
        assert_eq!(back.cover, rec.cover);
        assert_eq!(back.budget, Some(5.0));
    }

    #[test]
    fn write_then_read_jsonl() {
        let records = read_jsonl(LINE.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write_jsonl(&mut buf, &records).unwrap();
        let again = read_jsonl(buf.as_slice()).unwrap();
        assert_eq!(again, records);
    }
}
