//! Masked action decoding.
//!
//! Infeasible entries are forced to `f64::MIN` before normalization, so their
//! probability is exactly zero and the feasible probabilities sum to one.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::config::RLConfig;
use super::types::DecodeMode;
use crate::instance::DEPOT;

/// One decoded action with its bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: usize,
    /// Log-probability of `action` under the masked distribution.
    pub log_prob: f64,
    /// Entropy of the masked distribution.
    pub entropy: f64,
    /// True when the action came from the demonstration.
    pub followed_teacher: bool,
}

/// Replaces scores of infeasible nodes with the most negative representable value.
pub fn mask_logits(logits: &[f64], mask: &[bool]) -> Vec<f64> {
    logits
        .iter()
        .zip(mask)
        .map(|(&l, &feasible)| if feasible { l } else { f64::MIN })
        .collect()
}

/// Log-softmax over masked logits. Infeasible entries get a log-probability
/// near `f64::MIN`; their `exp` is exactly zero.
///
/// Returns `None` when no entry is feasible.
pub fn masked_log_softmax(logits: &[f64], mask: &[bool]) -> Option<Vec<f64>> {
    if !mask.iter().any(|&m| m) {
        return None;
    }
    let masked = mask_logits(logits, mask);
    let max = masked.iter().copied().fold(f64::MIN, f64::max);
    let sum: f64 = masked.iter().map(|&l| (l - max).exp()).sum();
    let lse = max + sum.ln();
    Some(masked.iter().map(|&l| l - lse).collect())
}

/// Softmax over masked logits. `None` when no entry is feasible.
pub fn masked_softmax(logits: &[f64], mask: &[bool]) -> Option<Vec<f64>> {
    masked_log_softmax(logits, mask).map(|lp| {
        lp.iter()
            .zip(mask)
            .map(|(&l, &feasible)| if feasible { l.exp() } else { 0.0 })
            .collect()
    })
}

/// Shannon entropy of a distribution given its probabilities and log-probabilities.
pub fn entropy(probs: &[f64], log_probs: &[f64]) -> f64 {
    -probs
        .iter()
        .zip(log_probs)
        .filter(|&(&p, _)| p > 0.0)
        .map(|(&p, &lp)| p * lp)
        .sum::<f64>()
}

/// Cross-entropy between masked logits and a target index.
///
/// The target's probability is floored at `floor`, which bounds the loss when
/// a demonstration steps onto a node the mask rules out.
pub fn cross_entropy(logits: &[f64], mask: &[bool], target: usize, floor: f64) -> f64 {
    match masked_log_softmax(logits, mask) {
        Some(lp) if mask[target] => -lp[target].max(floor.ln()),
        _ => -floor.ln(),
    }
}

/// Index of the largest feasible probability; ties go to the lowest index.
pub fn masked_argmax(probs: &[f64], mask: &[bool]) -> Option<usize> {
    probs
        .iter()
        .zip(mask)
        .enumerate()
        .filter(|&(_, (_, &feasible))| feasible)
        .fold(None, |best: Option<(usize, f64)>, (i, (&p, _))| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((i, p)),
        })
        .map(|(i, _)| i)
}

/// Turns policy scores and a feasibility mask into one action per episode.
#[derive(Debug, Clone)]
pub struct Decoder {
    pub mode: DecodeMode,
    config: RLConfig,
}

impl Decoder {
    pub fn new(mode: DecodeMode, config: RLConfig) -> Self {
        Self { mode, config }
    }

    /// Raw scores nudged by `scale × ln(1 + gain / (max_gain + ε))`.
    ///
    /// The bias is monotone and bounded by `scale × ln 2`, so it never
    /// overrides a clear preference of the scorer.
    pub fn logits(&self, scores: &[f64], gain: Option<&[f64]>) -> Vec<f64> {
        let mut logits = scores.to_vec();
        if !self.config.use_gain_bias {
            return logits;
        }
        if let Some(gain) = gain {
            let max = gain.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let norm = max + self.config.gain_normalizer_epsilon;
            for (l, &g) in logits.iter_mut().zip(gain) {
                *l += self.config.gain_bias_scale * (g / norm).ln_1p();
            }
        }
        logits
    }

    /// Picks an action.
    ///
    /// `teacher` is the demonstration's next node; it is required by the
    /// teacher-forcing modes and ignored otherwise (without one those modes
    /// fall back to greedy). Returns `None` when nothing is feasible and no
    /// demonstration move is forced.
    pub fn decode<R: Rng + ?Sized>(
        &self,
        logits: &[f64],
        mask: &[bool],
        teacher: Option<usize>,
        rng: &mut R,
    ) -> Option<Decision> {
        let floor = self.config.log_prob_floor.ln();
        let forced = match (self.mode, teacher) {
            (DecodeMode::TeacherForced, Some(t)) => Some(t),
            (DecodeMode::MixedTeacherForcing { ratio }, Some(t)) => {
                (rng.gen::<f64>() < ratio).then_some(t)
            }
            _ => None,
        };

        // An infeasible demonstration can strand the agent with an empty mask;
        // the forced move still proceeds at the floor probability.
        let log_probs = match (masked_log_softmax(logits, mask), forced) {
            (Some(lp), _) => lp,
            (None, Some(t)) => {
                return Some(Decision {
                    action: t,
                    log_prob: floor,
                    entropy: 0.0,
                    followed_teacher: true,
                })
            }
            (None, None) => return None,
        };
        let probs: Vec<f64> = log_probs
            .iter()
            .zip(mask)
            .map(|(&l, &feasible)| if feasible { l.exp() } else { 0.0 })
            .collect();
        let entropy = entropy(&probs, &log_probs);

        let (action, followed_teacher) = match forced {
            Some(t) => (t, true),
            None => {
                let a = match self.mode {
                    DecodeMode::Sample => WeightedIndex::new(&probs)
                        .map(|dist| dist.sample(rng))
                        .ok()
                        .or_else(|| masked_argmax(&probs, mask)),
                    _ => masked_argmax(&probs, mask),
                };
                (a.unwrap_or(DEPOT), false)
            }
        };

        let log_prob = if mask.get(action).copied().unwrap_or(false) {
            log_probs[action].max(floor)
        } else {
            floor
        };

        Some(Decision {
            action,
            log_prob,
            entropy,
            followed_teacher,
        })
    }
}
