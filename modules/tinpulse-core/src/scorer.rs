//! Headline scoring.
//!
//! Vietnamese text goes through the lexicon span scanner, optionally
//! blended with a secondary direction classifier. Everything else falls
//! back to the English rule-based polarity scorer. Labels come from the
//! fixed five-bucket threshold table in tinpulse-common.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use tinpulse_common::{Direction, Result, SentimentLabel};

use crate::lexicon::{MergedLexicon, DIMINISHERS, INTENSIFIERS, NEGATIONS};

/// Scanner inputs are truncated to this many characters. Headlines are
/// short; anything longer is body text that only dilutes the signal.
pub const MAX_SCAN_CHARS: usize = 512;

/// Window before a match (bytes, boundary-snapped) inspected for a
/// negation marker.
const NEGATION_WINDOW: usize = 25;
/// Window before a match inspected for an intensifier or diminisher.
const MODIFIER_WINDOW: usize = 20;
/// A negated term flips sign and dampens.
const NEGATION_SCALAR: f64 = -0.6;
/// Compression applied before tanh.
const SUM_SCALE: f64 = 0.6;

fn vietnamese_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            "[àáâãèéêìíòóôõùúýăđơưạảấầẩẫậắằẳẵặẹẻẽếềểễệỉịọỏốồổỗộớờởỡợụủứừửữựỳỵỷỹ\
             ÀÁÂÃÈÉÊÌÍÒÓÔÕÙÚÝĂĐƠƯẠẢẤẦẨẪẬẮẰẲẴẶẸẺẼẾỀỂỄỆỈỊỌỎỐỒỔỖỘỚỜỞỠỢỤỦỨỪỬỮỰỲỴỶỸ]",
        )
        .expect("vietnamese detection regex")
    })
}

/// True if the text carries Vietnamese-specific diacritics.
pub fn is_vietnamese(text: &str) -> bool {
    vietnamese_re().is_match(text)
}

/// Injectable secondary direction signal. The default wiring has none; a
/// failing classifier degrades to lexicon-only, never an error.
#[async_trait]
pub trait DirectionClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Option<Direction>>;
}

/// The "no secondary classifier" wiring.
pub struct NoSecondary;

#[async_trait]
impl DirectionClassifier for NoSecondary {
    async fn classify(&self, _text: &str) -> Result<Option<Direction>> {
        Ok(None)
    }
}

/// Scanner output before blending.
#[derive(Debug, Clone, Copy)]
pub struct LexiconScan {
    /// tanh-compressed score in (-1, 1).
    pub score: f64,
    /// Non-overlapping lexicon spans matched.
    pub hit_count: usize,
}

/// Final blended score for one headline.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub lexicon_score: f64,
    pub secondary: Option<Direction>,
    pub final_score: f64,
    pub final_label: SentimentLabel,
    pub hit_count: usize,
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Check the window before `idx` for a negation marker. Longest markers
/// are listed first so "không hề" is seen before "không".
fn apply_negation(text_lower: &str, idx: usize, weight: f64) -> f64 {
    let start = prefix_start(text_lower, idx, NEGATION_WINDOW);
    let prefix = &text_lower[start..idx];
    for negation in NEGATIONS {
        if prefix.contains(negation) {
            return weight * NEGATION_SCALAR;
        }
    }
    weight
}

/// Intensifier/diminisher multiplier from the window before `idx`.
fn modifier(text_lower: &str, idx: usize) -> f64 {
    let start = prefix_start(text_lower, idx, MODIFIER_WINDOW);
    let prefix = &text_lower[start..idx];
    for (word, mult) in INTENSIFIERS {
        if prefix.contains(word) {
            return *mult;
        }
    }
    for (word, mult) in DIMINISHERS {
        if prefix.contains(word) {
            return *mult;
        }
    }
    1.0
}

/// Byte index `window` bytes before `idx`, snapped to a char boundary.
fn prefix_start(text: &str, idx: usize, window: usize) -> usize {
    let mut start = idx.saturating_sub(window);
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    start
}

/// Non-overlapping longest-first span scan over both lexicon sides.
///
/// Each matched span records a signed weight adjusted for negation and a
/// nearby intensity modifier; the sum is compressed with tanh so several
/// weak signals can add up without saturating on one strong term.
pub fn scan(text: &str, lexicon: &MergedLexicon) -> LexiconScan {
    let text_lower = truncate_chars(text, MAX_SCAN_CHARS).to_lowercase();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();

    let mut scan_side = |terms: &[(String, f64)], sign: f64| {
        for (term, base_weight) in terms {
            let mut search_from = 0;
            while let Some(offset) = text_lower[search_from..].find(term.as_str()) {
                let idx = search_from + offset;
                let end = idx + term.len();
                let overlaps = spans
                    .iter()
                    .any(|&(s, e)| (s <= idx && idx < e) || (s < end && end <= e));
                if !overlaps {
                    let mut w = sign * base_weight.abs();
                    w = apply_negation(&text_lower, idx, w);
                    weights.push(w * modifier(&text_lower, idx));
                    spans.push((idx, end));
                }
                search_from = idx + 1;
                while !text_lower.is_char_boundary(search_from) {
                    search_from += 1;
                }
            }
        }
    };

    scan_side(&lexicon.positive, 1.0);
    scan_side(&lexicon.negative, -1.0);

    if weights.is_empty() {
        return LexiconScan {
            score: 0.0,
            hit_count: 0,
        };
    }

    let raw: f64 = weights.iter().sum();
    LexiconScan {
        score: (raw * SUM_SCALE).tanh(),
        hit_count: weights.len(),
    }
}

/// Blend the lexicon score with a secondary direction. The secondary
/// signal carries no magnitude of its own, only a sign.
pub fn blend(lexicon_score: f64, secondary: Option<Direction>, blend_ratio: f64) -> f64 {
    match secondary {
        Some(direction) if direction.sign() != 0.0 => {
            blend_ratio * lexicon_score + (1.0 - blend_ratio) * direction.sign()
        }
        _ => lexicon_score,
    }
}

/// Score one headline against the given merged lexicon.
///
/// Routing: empty text is Neutral; Vietnamese goes through the scanner and
/// blend; anything else gets the English rule-based compound as a complete
/// substitute.
pub async fn score_text(
    text: &str,
    lexicon: &MergedLexicon,
    classifier: &dyn DirectionClassifier,
    blend_ratio: f64,
) -> ScoreOutcome {
    if text.trim().is_empty() {
        return ScoreOutcome {
            lexicon_score: 0.0,
            secondary: None,
            final_score: 0.0,
            final_label: SentimentLabel::Neutral,
            hit_count: 0,
        };
    }

    if !is_vietnamese(text) {
        let compound = english_compound(truncate_chars(text, MAX_SCAN_CHARS));
        return ScoreOutcome {
            lexicon_score: compound,
            secondary: None,
            final_score: compound,
            final_label: SentimentLabel::from_score(compound),
            hit_count: 0,
        };
    }

    let scan_result = scan(text, lexicon);

    let secondary = match classifier.classify(truncate_chars(text, MAX_SCAN_CHARS)).await {
        Ok(direction) => direction,
        Err(e) => {
            warn!(error = %e, "Secondary classifier failed, using lexicon only");
            None
        }
    };

    let final_score = blend(scan_result.score, secondary, blend_ratio);
    ScoreOutcome {
        lexicon_score: scan_result.score,
        secondary,
        final_score,
        final_label: SentimentLabel::from_score(final_score),
        hit_count: scan_result.hit_count,
    }
}

fn english_compound(text: &str) -> f64 {
    let analyzer = vader_sentiment::SentimentIntensityAnalyzer::new();
    let scores = analyzer.polarity_scores(text);
    scores.get("compound").copied().unwrap_or(0.0)
}
