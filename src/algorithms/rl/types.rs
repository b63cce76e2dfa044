//! Core types shared by the environment, decoder, and rollout controller.

use std::fmt;

/// Per-node feasibility for the next move. Recomputed every step.
pub type ActionMask = Vec<bool>;

/// Lifecycle tag of one episode inside a batch.
///
/// Terminated episodes stay in the batch so that every tick has the same
/// shape; downstream code gates on this tag instead of truncating arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EpisodeStatus {
    #[default]
    Active,
    Terminated,
}

impl EpisodeStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, EpisodeStatus::Active)
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodeStatus::Active => write!(f, "active"),
            EpisodeStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// How the decoder turns masked scores into an action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeMode {
    /// Highest-probability feasible node.
    Greedy,
    /// Draw from the masked categorical distribution.
    Sample,
    /// Follow the supplied demonstration tour step for step.
    TeacherForced,
    /// Legacy soft teacher forcing: each step independently follows the
    /// demonstration with probability `ratio`, otherwise takes the model's
    /// masked argmax.
    MixedTeacherForcing { ratio: f64 },
}

impl DecodeMode {
    /// True when the mode consumes a demonstration tour.
    pub fn needs_demonstration(&self) -> bool {
        matches!(
            self,
            DecodeMode::TeacherForced | DecodeMode::MixedTeacherForcing { .. }
        )
    }
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeMode::Greedy => write!(f, "greedy"),
            DecodeMode::Sample => write!(f, "sample"),
            DecodeMode::TeacherForced => write!(f, "teacher"),
            DecodeMode::MixedTeacherForcing { ratio } => write!(f, "teacher({:.2})", ratio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_active() {
        assert!(EpisodeStatus::default().is_active());
        assert!(!EpisodeStatus::Terminated.is_active());
    }

    #[test]
    fn teacher_modes_need_tours() {
        assert!(DecodeMode::TeacherForced.needs_demonstration());
        assert!(DecodeMode::MixedTeacherForcing { ratio: 0.5 }.needs_demonstration());
        assert!(!DecodeMode::Greedy.needs_demonstration());
        assert_eq!(DecodeMode::Sample.to_string(), "sample");
    }
}
