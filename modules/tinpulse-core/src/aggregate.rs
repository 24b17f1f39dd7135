//! Automatic promotion of mined keyword suggestions into lexicon entries.
//!
//! Pure computation over suggestion rows. The caller decides the lookback
//! window and persistence; this module only scores, filters, and picks the
//! dominant sentiment type per keyword.

use std::collections::HashMap;

use tinpulse_common::SentimentType;
use tinpulse_store::SuggestionRow;

use crate::lexicon::is_static_term;

/// Weight ceiling for anything promoted without human review.
const AUTO_WEIGHT_CAP: f64 = 0.8;

/// A suggestion that cleared the promotion thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedKeyword {
    pub keyword: String,
    pub sentiment_type: SentimentType,
    pub weight: f64,
    pub confidence: f64,
    pub frequency: i64,
}

fn confidence(frequency: i64, max_cooccurrence: i64) -> f64 {
    let freq_part = (frequency as f64 / 10.0).min(1.0);
    let cooc_part = (max_cooccurrence as f64 / 5.0).min(1.0);
    freq_part * cooc_part
}

/// Promote suggestions that occur often enough, alongside enough existing
/// lexicon matches, to trust without review.
///
/// Reviewed rows are the human path and never enter here; keywords already
/// in the static lexicon are skipped outright. When the same keyword was
/// mined under both sentiment types, the more frequent one wins.
pub fn aggregate(
    rows: &[SuggestionRow],
    min_confidence: f64,
    min_frequency: i64,
) -> Vec<AggregatedKeyword> {
    let mut by_keyword: HashMap<&str, AggregatedKeyword> = HashMap::new();

    for row in rows {
        if row.reviewed || is_static_term(&row.keyword) {
            continue;
        }
        let Some(sentiment_type) = SentimentType::from_str_loose(&row.sentiment_type) else {
            continue;
        };

        let confidence = confidence(row.frequency, row.max_cooccurrence);
        if row.frequency < min_frequency || confidence < min_confidence {
            continue;
        }
        let weight = (row.avg_weight * (0.5 + confidence * 0.5)).min(AUTO_WEIGHT_CAP);

        let candidate = AggregatedKeyword {
            keyword: row.keyword.clone(),
            sentiment_type,
            weight,
            confidence,
            frequency: row.frequency,
        };
        match by_keyword.get(row.keyword.as_str()) {
            Some(existing) if existing.frequency >= candidate.frequency => {}
            _ => {
                by_keyword.insert(&row.keyword, candidate);
            }
        }
    }

    let mut promoted: Vec<AggregatedKeyword> = by_keyword.into_values().collect();
    promoted.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    promoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn row(
        keyword: &str,
        sentiment_type: &str,
        frequency: i64,
        avg_weight: f64,
        max_cooccurrence: i64,
        reviewed: bool,
    ) -> SuggestionRow {
        SuggestionRow {
            id: Uuid::new_v4(),
            keyword: keyword.to_string(),
            sentiment_type: sentiment_type.to_string(),
            frequency,
            avg_weight,
            max_cooccurrence,
            reviewed,
            created_at: Utc::now(),
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn frequent_well_grounded_suggestion_is_promoted() {
        let rows = vec![row("cổ tức đặc biệt", "positive", 6, 0.7, 4, false)];
        let promoted = aggregate(&rows, 0.3, 2);
        assert_eq!(promoted.len(), 1);

        let kw = &promoted[0];
        assert_eq!(kw.keyword, "cổ tức đặc biệt");
        assert_eq!(kw.sentiment_type, SentimentType::Positive);

        let expected_conf = (6.0f64 / 10.0) * (4.0f64 / 5.0);
        assert!((kw.confidence - expected_conf).abs() < 1e-12);
        let expected_weight = (0.7 * (0.5 + expected_conf * 0.5)).min(0.8);
        assert!((kw.weight - expected_weight).abs() < 1e-12);
    }

    #[test]
    fn weight_is_capped() {
        let rows = vec![row("vỡ nợ trái phiếu", "negative", 20, 1.0, 10, false)];
        let promoted = aggregate(&rows, 0.3, 2);
        assert_eq!(promoted[0].weight, 0.8);
        assert_eq!(promoted[0].confidence, 1.0);
    }

    #[test]
    fn rare_or_ungrounded_suggestions_stay_out() {
        let rows = vec![
            // Below min_frequency.
            row("thoái vốn nhà nước", "negative", 1, 0.6, 5, false),
            // Frequent but never co-occurred with known terms.
            row("họp đại hội", "positive", 8, 0.6, 0, false),
        ];
        assert!(aggregate(&rows, 0.3, 2).is_empty());
    }

    #[test]
    fn reviewed_and_static_terms_are_excluded() {
        let rows = vec![
            row("nới room ngoại", "positive", 9, 0.7, 5, true),
            // Already in the built-in lexicon.
            row("tăng mạnh", "positive", 9, 0.7, 5, false),
        ];
        assert!(aggregate(&rows, 0.3, 2).is_empty());
    }

    #[test]
    fn dominant_type_wins_on_keyword_collision() {
        let rows = vec![
            row("chia tách cổ phiếu", "negative", 3, 0.5, 5, false),
            row("chia tách cổ phiếu", "positive", 7, 0.5, 5, false),
        ];
        let promoted = aggregate(&rows, 0.1, 2);
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].sentiment_type, SentimentType::Positive);
        assert_eq!(promoted[0].frequency, 7);
    }

    #[test]
    fn unparseable_sentiment_type_is_skipped() {
        let rows = vec![row("dòng tiền mới", "meh", 9, 0.7, 5, false)];
        assert!(aggregate(&rows, 0.3, 2).is_empty());
    }

    /// The full feedback loop in miniature: the same correction mined ten
    /// times folds into one suggestion per n-gram, the recurring non-static
    /// keyword clears the promotion thresholds, and the merged lexicon picks
    /// it up while the static entries stay untouched.
    #[test]
    fn repeated_corrections_promote_a_recurring_keyword_into_the_lexicon() {
        use crate::lexicon::{merge, static_lexicon};
        use crate::miner;

        let lexicon = static_lexicon();
        let title = "Vingroup lãi lớn, cổ phiếu tăng mạnh";

        // Fold candidates the way the store upsert does: per keyword,
        // frequency counts sightings, avg_weight is the running mean, and
        // max_cooccurrence keeps the best grounding seen.
        let mut folded: HashMap<String, SuggestionRow> = HashMap::new();
        for _ in 0..10 {
            for candidate in miner::mine_candidates(title, 0.6, 0.0, 0.3, &lexicon) {
                match folded.get_mut(&candidate.keyword) {
                    Some(existing) => {
                        let total = existing.avg_weight * existing.frequency as f64
                            + candidate.suggested_weight;
                        existing.frequency += 1;
                        existing.avg_weight = total / existing.frequency as f64;
                        existing.max_cooccurrence =
                            existing.max_cooccurrence.max(candidate.cooccurrence);
                    }
                    None => {
                        folded.insert(
                            candidate.keyword.clone(),
                            row(
                                &candidate.keyword,
                                &candidate.sentiment_type.to_string(),
                                1,
                                candidate.suggested_weight,
                                candidate.cooccurrence,
                                false,
                            ),
                        );
                    }
                }
            }
        }

        let rows: Vec<SuggestionRow> = folded.into_values().collect();
        let promoted = aggregate(&rows, 0.3, 2);

        let kw = promoted
            .iter()
            .find(|k| k.keyword == "cổ phiếu")
            .expect("recurring keyword should be promoted");
        assert_eq!(kw.sentiment_type, SentimentType::Positive);
        assert_eq!(kw.frequency, 10);
        assert!(kw.confidence >= 0.3);

        // "tăng mạnh" recurs just as often but is a built-in term.
        assert!(!promoted.iter().any(|k| k.keyword == "tăng mạnh"));

        let merged = merge(&[], &promoted);
        assert!(merged
            .positive
            .iter()
            .any(|(t, w)| t == "cổ phiếu" && (*w - kw.weight).abs() < 1e-12));
        let static_weight = merged
            .positive
            .iter()
            .find(|(t, _)| t == "tăng mạnh")
            .map(|(_, w)| *w);
        assert_eq!(static_weight, Some(0.8));
    }
}
