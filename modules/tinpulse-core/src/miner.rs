//! Keyword mining from correction feedback.
//!
//! When a human or LLM label lands far from the predicted score, the title
//! evidently carries sentiment the lexicon missed. This module extracts the
//! n-gram candidates for that missing vocabulary; persistence and
//! aggregation happen elsewhere.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tinpulse_common::{MinedCandidate, SentimentType};

use crate::lexicon::MergedLexicon;
use crate::scorer;

/// Minimum prediction error before a title is worth mining.
pub const DEFAULT_ERROR_THRESHOLD: f64 = 0.3;

/// Minimum candidate length in characters. Shorter n-grams are almost
/// always function words in Vietnamese.
const MIN_CHARS: usize = 4;

/// High-frequency Vietnamese function words and calendar terms. None of
/// these carry sentiment on their own and they pollute every bigram.
const STOPWORDS: &[&str] = &[
    "của", "và", "có", "này", "cho", "từ", "với", "trong", "là", "được", "các", "để", "một",
    "về", "đã", "những", "thì", "sẽ", "như", "trên", "ra", "tại", "hay", "theo", "đến", "hôm",
    "nay", "ngày", "tháng", "năm", "giờ", "phút", "vn", "việt", "nam", "đang", "bị", "sau",
    "trước",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Unicode word characters, so Vietnamese diacritics stay inside tokens.
    RE.get_or_init(|| Regex::new(r"\w+").expect("word regex"))
}

/// Whether the gap between user and predicted score warrants mining.
pub fn should_mine(user_score: f64, predicted_score: f64, threshold: f64) -> bool {
    (user_score - predicted_score).abs() > threshold
}

fn tokenize(title: &str) -> Vec<String> {
    let lowered = title.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|t| !stopwords().contains(t.as_str()))
        .collect()
}

fn ngrams(tokens: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for n in 1..=3usize {
        for window in tokens.windows(n) {
            let gram = window.join(" ");
            if gram.chars().count() >= MIN_CHARS && seen.insert(gram.clone()) {
                out.push(gram);
            }
        }
    }
    out
}

/// Extract keyword candidates from a mislabeled title.
///
/// Returns nothing when the prediction error is within `threshold` or the
/// user score is too close to neutral to assign a sentiment type. The
/// co-occurrence count is how many known lexicon spans matched the same
/// title, which later gates auto-promotion.
pub fn mine_candidates(
    title: &str,
    user_score: f64,
    predicted_score: f64,
    threshold: f64,
    lexicon: &MergedLexicon,
) -> Vec<MinedCandidate> {
    if !should_mine(user_score, predicted_score, threshold) {
        return Vec::new();
    }
    let Some(sentiment_type) = SentimentType::from_user_score(user_score) else {
        return Vec::new();
    };

    let cooccurrence = scorer::scan(title, lexicon).hit_count as i64;
    let suggested_weight = user_score.abs();

    ngrams(&tokenize(title))
        .into_iter()
        .map(|keyword| MinedCandidate {
            keyword,
            sentiment_type,
            suggested_weight,
            cooccurrence,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::static_lexicon;

    #[test]
    fn small_errors_are_not_mined() {
        let lexicon = static_lexicon();
        let out = mine_candidates("VNM công bố kết quả", 0.5, 0.3, 0.3, &lexicon);
        assert!(out.is_empty());
    }

    #[test]
    fn near_neutral_user_scores_are_not_mined() {
        let lexicon = static_lexicon();
        let out = mine_candidates("VNM công bố kết quả", 0.1, -0.5, 0.3, &lexicon);
        assert!(out.is_empty());
    }

    #[test]
    fn mining_yields_deduplicated_ngrams_with_shared_metadata() {
        let lexicon = static_lexicon();
        let out = mine_candidates(
            "Doanh nghiệp thép hưởng lợi thuế quan",
            -0.6,
            0.2,
            0.3,
            &lexicon,
        );
        assert!(!out.is_empty());

        let keywords: Vec<&str> = out.iter().map(|c| c.keyword.as_str()).collect();
        assert!(keywords.contains(&"doanh nghiệp"));
        assert!(keywords.contains(&"doanh nghiệp thép"));
        assert!(keywords.contains(&"thuế quan"));

        let unique: HashSet<&&str> = keywords.iter().collect();
        assert_eq!(unique.len(), keywords.len());

        for candidate in &out {
            assert_eq!(candidate.sentiment_type, SentimentType::Negative);
            assert!((candidate.suggested_weight - 0.6).abs() < 1e-12);
        }
    }

    #[test]
    fn stopwords_and_short_grams_are_dropped() {
        let lexicon = static_lexicon();
        let out = mine_candidates("Giá vàng của hôm nay đã tăng", 0.7, 0.1, 0.3, &lexicon);
        for candidate in &out {
            assert!(!candidate.keyword.split(' ').any(|w| w == "của"));
            assert!(!candidate.keyword.split(' ').any(|w| w == "hôm"));
            assert!(candidate.keyword.chars().count() >= 4);
        }
    }

    #[test]
    fn cooccurrence_counts_known_lexicon_spans() {
        let lexicon = static_lexicon();
        let out = mine_candidates(
            "Cổ phiếu ngân hàng tăng mạnh nhờ thanh khoản dồi dào",
            0.8,
            0.1,
            0.3,
            &lexicon,
        );
        assert!(!out.is_empty());
        // "tăng mạnh" is a known positive span in the built-in lexicon.
        assert!(out[0].cooccurrence >= 1);
    }
}
