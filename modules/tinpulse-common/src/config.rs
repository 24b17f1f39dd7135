use std::env;

/// Application configuration loaded from environment variables.
///
/// Scoring knobs here are policy parameters, not derived optima — the blend
/// ratio and uncertainty weights in particular are tunable, and their
/// defaults come from the values the system shipped with.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // LLM annotator (optional collaborator)
    pub annotator_api_key: String,
    pub annotator_base_url: String,
    pub annotator_model: String,
    /// Annotations below this confidence are cached but never ingested
    /// as feedback.
    pub annotator_min_confidence: f64,

    // Scoring policy
    /// Lexicon share of the blended Vietnamese score. Remainder goes to the
    /// secondary direction signal when one is wired in.
    pub blend_ratio: f64,
    /// |user_score - predicted_score| above which the keyword miner runs.
    pub mining_error_threshold: f64,

    // Uncertainty weight profiles (conflict / magnitude / sparsity [/ model])
    pub uncertainty_weights_base: [f64; 3],
    pub uncertainty_weights_extended: [f64; 4],

    // Caches
    /// Staleness bound for the merged lexicon and aggregated keywords, in
    /// seconds. A read within this window may serve the previous snapshot.
    pub lexicon_ttl_secs: u64,

    // Aggregation defaults
    pub aggregation_min_confidence: f64,
    pub aggregation_min_frequency: i64,
    pub aggregation_lookback_days: i64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            annotator_api_key: env::var("ANNOTATOR_API_KEY").unwrap_or_default(),
            annotator_base_url: env::var("ANNOTATOR_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            annotator_model: env::var("ANNOTATOR_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            annotator_min_confidence: parsed_env("ANNOTATOR_MIN_CONFIDENCE", 0.6),
            blend_ratio: parsed_env("BLEND_RATIO", 0.7),
            mining_error_threshold: parsed_env("MINING_ERROR_THRESHOLD", 0.3),
            uncertainty_weights_base: [0.45, 0.30, 0.25],
            uncertainty_weights_extended: [0.35, 0.25, 0.20, 0.20],
            lexicon_ttl_secs: parsed_env("LEXICON_TTL_SECS", 300),
            aggregation_min_confidence: parsed_env("AGGREGATION_MIN_CONFIDENCE", 0.3),
            aggregation_min_frequency: parsed_env("AGGREGATION_MIN_FREQUENCY", 2),
            aggregation_lookback_days: parsed_env("AGGREGATION_LOOKBACK_DAYS", 30),
        }
    }
}

impl Default for Config {
    /// Defaults without touching the environment. Used by tests and by
    /// callers that construct the scoring stack without a database URL.
    fn default() -> Self {
        Self {
            database_url: String::new(),
            annotator_api_key: String::new(),
            annotator_base_url: "https://api.openai.com/v1".to_string(),
            annotator_model: "gpt-4o-mini".to_string(),
            annotator_min_confidence: 0.6,
            blend_ratio: 0.7,
            mining_error_threshold: 0.3,
            uncertainty_weights_base: [0.45, 0.30, 0.25],
            uncertainty_weights_extended: [0.35, 0.25, 0.20, 0.20],
            lexicon_ttl_secs: 300,
            aggregation_min_confidence: 0.3,
            aggregation_min_frequency: 2,
            aggregation_lookback_days: 30,
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
