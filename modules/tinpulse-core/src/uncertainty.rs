//! Uncertainty estimation over a scored headline.
//!
//! Three always-on sub-signals (signal conflict, boundary proximity, match
//! sparsity) plus an optional fourth when a third classifier disagrees with
//! the final label. The composite drives labeling-queue priority: high
//! uncertainty headlines are the ones worth a human's time.

use tinpulse_common::{Direction, UncertaintySnapshot, LABEL_BOUNDARIES};

use crate::scorer::ScoreOutcome;

/// Boundary proximity radius. At or beyond this distance from every label
/// boundary the magnitude signal is zero.
const BOUNDARY_RADIUS: f64 = 0.15;

/// Weight profiles over (conflict, magnitude, sparsity[, model]).
#[derive(Debug, Clone, Copy)]
pub struct UncertaintyWeights {
    pub base: [f64; 3],
    pub extended: [f64; 4],
}

impl Default for UncertaintyWeights {
    fn default() -> Self {
        Self {
            base: [0.45, 0.30, 0.25],
            extended: [0.35, 0.25, 0.20, 0.20],
        }
    }
}

/// Disagreement between the lexicon direction and the secondary signal.
///
/// No secondary or a neutral one is mild uncertainty, scaled by whether the
/// lexicon itself was decisive. Agreement shrinks with lexicon strength;
/// disagreement grows with it.
pub fn signal_conflict(lexicon_score: f64, secondary: Option<Direction>) -> f64 {
    let secondary_sign = match secondary {
        None | Some(Direction::Neutral) => {
            return if lexicon_score.abs() < 0.1 { 0.3 } else { 0.5 };
        }
        Some(direction) => direction.sign(),
    };

    let lexicon_sign = if lexicon_score > 0.05 {
        1.0
    } else if lexicon_score < -0.05 {
        -1.0
    } else {
        return 0.4;
    };

    if lexicon_sign == secondary_sign {
        (0.2 - lexicon_score.abs() * 0.2).max(0.0)
    } else {
        (lexicon_score.abs() * 0.9 + 0.1).min(1.0)
    }
}

/// Proximity of the final score to the nearest label boundary: 1.0 exactly
/// on a boundary, 0.0 at least `BOUNDARY_RADIUS` away from all of them.
pub fn magnitude_uncertainty(final_score: f64) -> f64 {
    let min_dist = LABEL_BOUNDARIES
        .iter()
        .map(|b| (final_score - b).abs())
        .fold(f64::INFINITY, f64::min);
    if min_dist >= BOUNDARY_RADIUS {
        0.0
    } else {
        1.0 - min_dist / BOUNDARY_RADIUS
    }
}

/// How few lexicon spans matched. Zero hits means the scorer was guessing.
pub fn match_sparsity(hit_count: usize) -> f64 {
    match hit_count {
        0 => 1.0,
        1 => 0.7,
        2 => 0.4,
        _ => 0.1,
    }
}

/// Compose the sub-signals into one [0, 1] snapshot.
pub fn assess(
    outcome: &ScoreOutcome,
    model_conflict: Option<f64>,
    weights: &UncertaintyWeights,
) -> UncertaintySnapshot {
    let conflict = signal_conflict(outcome.lexicon_score, outcome.secondary);
    let magnitude = magnitude_uncertainty(outcome.final_score);
    let sparsity = match_sparsity(outcome.hit_count);

    let composite = match model_conflict {
        Some(mc) => {
            let [wc, wm, ws, wx] = weights.extended;
            wc * conflict + wm * magnitude + ws * sparsity + wx * mc
        }
        None => {
            let [wc, wm, ws] = weights.base;
            wc * conflict + wm * magnitude + ws * sparsity
        }
    };

    UncertaintySnapshot {
        lexicon_score: outcome.lexicon_score,
        secondary_label: outcome.secondary,
        final_score: outcome.final_score,
        final_label: outcome.final_label,
        uncertainty_score: composite.clamp(0.0, 1.0),
        signal_conflict: conflict,
        magnitude_uncertainty: magnitude,
        match_sparsity: sparsity,
        model_conflict,
    }
}
