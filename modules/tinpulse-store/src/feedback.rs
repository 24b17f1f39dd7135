//! Append-only feedback and its statistics.

use tracing::debug;
use uuid::Uuid;

use tinpulse_common::{MinedCandidate, NewFeedback, Result};

use crate::keywords::upsert_candidate;
use crate::Store;

/// Rolling feedback quality metrics for a trailing window.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct FeedbackStats {
    pub total: i64,
    /// Predictions within 0.2 of the correction.
    pub accurate: i64,
    pub avg_error: Option<f64>,
}

impl FeedbackStats {
    pub fn accuracy_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.accurate as f64 / self.total as f64
    }
}

impl Store {
    /// Record a correction together with its mined keyword candidates.
    ///
    /// Atomic per feedback event: either the feedback row and every
    /// suggestion increment land, or none do.
    pub async fn insert_feedback(
        &self,
        feedback: &NewFeedback,
        candidates: &[MinedCandidate],
    ) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        let feedback_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO feedback
                (article_id, title, url, predicted_score, predicted_label,
                 user_score, user_label, comment, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(feedback.article_id)
        .bind(&feedback.title)
        .bind(&feedback.url)
        .bind(feedback.predicted_score)
        .bind(feedback.predicted_label.as_str())
        .bind(feedback.user_score)
        .bind(feedback.user_label.as_str())
        .bind(&feedback.comment)
        .bind(feedback.source.to_string())
        .fetch_one(&mut *tx)
        .await?;

        for candidate in candidates {
            upsert_candidate(&mut tx, candidate).await?;
        }

        tx.commit().await?;
        debug!(
            %feedback_id,
            candidates = candidates.len(),
            source = %feedback.source,
            "Feedback recorded"
        );
        Ok(feedback_id)
    }

    pub async fn feedback_stats(&self, days: i64) -> Result<FeedbackStats> {
        let stats = sqlx::query_as::<_, FeedbackStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE ABS(user_score - predicted_score) <= 0.2) AS accurate,
                AVG(ABS(user_score - predicted_score)) AS avg_error
            FROM feedback
            WHERE created_at >= now() - ($1 || ' days')::interval
            "#,
        )
        .bind(days.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    pub async fn count_feedback(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM feedback")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
