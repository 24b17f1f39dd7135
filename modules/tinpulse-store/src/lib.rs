//! Postgres persistence for the sentiment loop.
//!
//! One relational store holds every entity; the merged lexicon and
//! aggregated keywords are derived reads, never persisted, so truncating
//! caches can never corrupt the source of truth.

pub mod articles;
pub mod evaluations;
pub mod feedback;
pub mod keywords;
pub mod queue;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use tinpulse_common::{Result, TinPulseError};

pub use evaluations::EvaluationRow;
pub use feedback::FeedbackStats;
pub use keywords::{LearnedKeywordRow, SuggestionRow};
pub use queue::{NewQueueItem, QueueBuildCounts, QueueItemRow, QueueStats};

/// Shared handle to the Postgres store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TinPulseError::Other(e.into()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
