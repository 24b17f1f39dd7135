use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Label thresholds ---

/// Score boundaries between the five sentiment buckets.
pub const LABEL_BOUNDARIES: [f64; 4] = [-0.35, -0.15, 0.15, 0.35];

/// Five-way sentiment label derived deterministically from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SentimentLabel {
    Bearish,
    SomewhatBearish,
    Neutral,
    SomewhatBullish,
    Bullish,
}

impl SentimentLabel {
    /// Fixed five-bucket threshold table. The only way a label is produced.
    pub fn from_score(score: f64) -> Self {
        if score <= -0.35 {
            SentimentLabel::Bearish
        } else if score <= -0.15 {
            SentimentLabel::SomewhatBearish
        } else if score < 0.15 {
            SentimentLabel::Neutral
        } else if score < 0.35 {
            SentimentLabel::SomewhatBullish
        } else {
            SentimentLabel::Bullish
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Bearish => "Bearish",
            SentimentLabel::SomewhatBearish => "Somewhat-Bearish",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::SomewhatBullish => "Somewhat-Bullish",
            SentimentLabel::Bullish => "Bullish",
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "bearish" | "negative" => SentimentLabel::Bearish,
            "somewhat-bearish" => SentimentLabel::SomewhatBearish,
            "somewhat-bullish" => SentimentLabel::SomewhatBullish,
            "bullish" | "positive" => SentimentLabel::Bullish,
            _ => SentimentLabel::Neutral,
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side of the lexicon a keyword belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SentimentType {
    Positive,
    Negative,
}

impl SentimentType {
    /// Classify a user score into a lexicon side, if its magnitude is
    /// meaningful enough (|score| >= 0.15).
    pub fn from_user_score(score: f64) -> Option<Self> {
        if score > 0.15 {
            Some(SentimentType::Positive)
        } else if score < -0.15 {
            Some(SentimentType::Negative)
        } else {
            None
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "positive" => Some(SentimentType::Positive),
            "negative" => Some(SentimentType::Negative),
            _ => None,
        }
    }
}

impl std::fmt::Display for SentimentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentType::Positive => write!(f, "positive"),
            SentimentType::Negative => write!(f, "negative"),
        }
    }
}

/// Coarse direction returned by the optional secondary classifier.
/// Informational only — no numeric confidence attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Positive,
    Negative,
    Neutral,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
            Direction::Neutral => 0.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Positive => write!(f, "positive"),
            Direction::Negative => write!(f, "negative"),
            Direction::Neutral => write!(f, "neutral"),
        }
    }
}

// --- Articles ---

/// A stored headline. Immutable once written; identity is
/// (source, title, crawl_date).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: Uuid,
    pub source: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub crawl_date: NaiveDate,
    pub crawled_at: DateTime<Utc>,
}

/// What the scraper boundary delivers. The store deduplicates on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedArticle {
    pub source: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Sentiment computed for an article; mutable only by re-scoring.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SentimentRecord {
    pub article_id: Uuid,
    pub score: f64,
    pub label: String,
    pub scored_at: DateTime<Utc>,
}

// --- Labeling queue ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Labeled,
    Skipped,
}

impl QueueStatus {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "labeled" => QueueStatus::Labeled,
            "skipped" => QueueStatus::Skipped,
            _ => QueueStatus::Pending,
        }
    }

    /// Only `pending` admits transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueueStatus::Pending)
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Pending => write!(f, "pending"),
            QueueStatus::Labeled => write!(f, "labeled"),
            QueueStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// The uncertainty breakdown frozen onto a queue item at enqueue time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintySnapshot {
    pub lexicon_score: f64,
    pub secondary_label: Option<Direction>,
    pub final_score: f64,
    pub final_label: SentimentLabel,
    pub uncertainty_score: f64,
    pub signal_conflict: f64,
    pub magnitude_uncertainty: f64,
    pub match_sparsity: f64,
    /// Present only when a third independent classifier is wired in.
    pub model_conflict: Option<f64>,
}

// --- Feedback ---

/// Where a feedback row came from. The LLM annotator is treated
/// identically to a human downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    Admin,
    Llm,
}

impl std::fmt::Display for FeedbackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedbackSource::Admin => write!(f, "admin"),
            FeedbackSource::Llm => write!(f, "llm"),
        }
    }
}

/// A correction to submit. Append-only once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeedback {
    pub article_id: Option<Uuid>,
    pub title: String,
    pub url: String,
    pub predicted_score: f64,
    pub predicted_label: SentimentLabel,
    pub user_score: f64,
    pub user_label: SentimentLabel,
    pub comment: Option<String>,
    pub source: FeedbackSource,
}

/// A keyword candidate mined from one corrected title. The store folds
/// these into `keyword_suggestions` atomically with the feedback row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinedCandidate {
    pub keyword: String,
    pub sentiment_type: SentimentType,
    pub suggested_weight: f64,
    /// Static-lexicon hits observed in the same title.
    pub cooccurrence: i64,
}

// --- Annotator boundary ---

/// One item of the batch LLM evaluator's response contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub article_id: Option<Uuid>,
    pub title: String,
    pub score: f64,
    pub label: SentimentLabel,
    pub confidence: f64,
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_buckets_match_threshold_table() {
        assert_eq!(SentimentLabel::from_score(-1.0), SentimentLabel::Bearish);
        assert_eq!(SentimentLabel::from_score(-0.35), SentimentLabel::Bearish);
        assert_eq!(
            SentimentLabel::from_score(-0.3),
            SentimentLabel::SomewhatBearish
        );
        assert_eq!(
            SentimentLabel::from_score(-0.15),
            SentimentLabel::SomewhatBearish
        );
        assert_eq!(SentimentLabel::from_score(-0.149), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(0.0), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(0.149), SentimentLabel::Neutral);
        assert_eq!(
            SentimentLabel::from_score(0.15),
            SentimentLabel::SomewhatBullish
        );
        assert_eq!(
            SentimentLabel::from_score(0.349),
            SentimentLabel::SomewhatBullish
        );
        assert_eq!(SentimentLabel::from_score(0.35), SentimentLabel::Bullish);
        assert_eq!(SentimentLabel::from_score(1.0), SentimentLabel::Bullish);
    }

    #[test]
    fn sentiment_type_requires_meaningful_magnitude() {
        assert_eq!(
            SentimentType::from_user_score(0.6),
            Some(SentimentType::Positive)
        );
        assert_eq!(
            SentimentType::from_user_score(-0.2),
            Some(SentimentType::Negative)
        );
        assert_eq!(SentimentType::from_user_score(0.1), None);
        assert_eq!(SentimentType::from_user_score(-0.15), None);
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(!QueueStatus::Pending.is_terminal());
        assert!(QueueStatus::Labeled.is_terminal());
        assert!(QueueStatus::Skipped.is_terminal());
    }
}
