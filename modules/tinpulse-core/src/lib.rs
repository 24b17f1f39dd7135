//! Adaptive sentiment scoring for Vietnamese financial headlines.
//!
//! The loop: a layered lexicon scores each headline, an uncertainty
//! estimator ranks what the scorer is least sure about, the most uncertain
//! titles queue up for human (or LLM) labels, corrections feed a keyword
//! miner, and mined keywords that prove themselves get aggregated back
//! into the lexicon. `search` adds BM25-ranked ticker lookup over titles.

pub mod aggregate;
pub mod engine;
pub mod evaluate;
pub mod lexicon;
pub mod miner;
pub mod queue;
pub mod scorer;
pub mod search;
pub mod uncertainty;

pub use aggregate::{aggregate, AggregatedKeyword};
pub use engine::SentimentEngine;
pub use evaluate::EvaluationService;
pub use lexicon::{LexiconCache, MergedLexicon};
pub use queue::QueueService;
pub use scorer::{score_text, DirectionClassifier, NoSecondary, ScoreOutcome};
pub use search::{get_aliases, rank, search_articles, SearchHit};
pub use uncertainty::UncertaintyWeights;
