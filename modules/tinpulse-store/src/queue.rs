//! Labeling queue rows and the review state machine.
//!
//! All transitions are guarded inside transactions so a concurrent submit
//! and skip against the same item cannot both win.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use tinpulse_common::{
    MinedCandidate, QueueStatus, Result, SentimentLabel, TinPulseError,
};

use crate::keywords::upsert_candidate;
use crate::Store;

/// A row from labeling_queue.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueItemRow {
    pub id: Uuid,
    pub article_id: Uuid,
    pub title: String,
    pub url: String,
    pub crawl_date: NaiveDate,
    pub lexicon_score: f64,
    pub secondary_label: Option<String>,
    pub final_score: f64,
    pub final_label: String,
    pub uncertainty_score: f64,
    pub signal_conflict: f64,
    pub magnitude_uncertainty: f64,
    pub match_sparsity: f64,
    pub model_conflict: Option<f64>,
    pub queue_date: NaiveDate,
    pub status: String,
    pub priority_rank: i32,
    pub reviewer_score: Option<f64>,
    pub reviewer_label: Option<String>,
    pub reviewer_comment: Option<String>,
    pub feedback_id: Option<Uuid>,
    pub labeled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QueueItemRow {
    pub fn status(&self) -> QueueStatus {
        QueueStatus::from_str_loose(&self.status)
    }
}

/// Parameters for inserting one ranked queue item.
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub article_id: Uuid,
    pub title: String,
    pub url: String,
    pub crawl_date: NaiveDate,
    pub lexicon_score: f64,
    pub secondary_label: Option<String>,
    pub final_score: f64,
    pub final_label: String,
    pub uncertainty_score: f64,
    pub signal_conflict: f64,
    pub magnitude_uncertainty: f64,
    pub match_sparsity: f64,
    pub model_conflict: Option<f64>,
    pub queue_date: NaiveDate,
    pub priority_rank: i32,
}

/// What a queue build run did, with "already present" reported separately
/// from "newly inserted" so idempotent re-runs are observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBuildCounts {
    pub inserted: u64,
    pub already_queued: u64,
    pub total_candidates: u64,
}

/// Per-date queue summary.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct QueueStats {
    pub total: i64,
    pub pending: i64,
    pub labeled: i64,
    pub skipped: i64,
    pub avg_uncertainty: Option<f64>,
    pub max_uncertainty: Option<f64>,
    pub min_uncertainty: Option<f64>,
}

impl Store {
    /// Articles of a crawl date that have no queue row for that date yet.
    pub async fn unqueued_articles(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<tinpulse_common::Article>> {
        let rows = sqlx::query_as::<_, tinpulse_common::Article>(
            r#"
            SELECT a.* FROM articles a
            WHERE a.crawl_date = $1
              AND NOT EXISTS (
                  SELECT 1 FROM labeling_queue q
                  WHERE q.article_id = a.id AND q.queue_date = $1
              )
            ORDER BY a.crawled_at ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_articles_for_date(&self, date: NaiveDate) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles WHERE crawl_date = $1")
                .bind(date)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Insert ranked queue items as pending. Idempotent: items already
    /// present for (article, queue_date) are left untouched.
    pub async fn insert_queue_items(&self, items: &[NewQueueItem]) -> Result<u64> {
        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;

        for item in items {
            let result = sqlx::query(
                r#"
                INSERT INTO labeling_queue
                    (article_id, title, url, crawl_date,
                     lexicon_score, secondary_label, final_score, final_label,
                     uncertainty_score, signal_conflict, magnitude_uncertainty,
                     match_sparsity, model_conflict, queue_date, status, priority_rank)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                        'pending', $15)
                ON CONFLICT (article_id, queue_date) DO NOTHING
                "#,
            )
            .bind(item.article_id)
            .bind(&item.title)
            .bind(&item.url)
            .bind(item.crawl_date)
            .bind(item.lexicon_score)
            .bind(&item.secondary_label)
            .bind(item.final_score)
            .bind(item.final_label.as_str())
            .bind(item.uncertainty_score)
            .bind(item.signal_conflict)
            .bind(item.magnitude_uncertainty)
            .bind(item.match_sparsity)
            .bind(item.model_conflict)
            .bind(item.queue_date)
            .bind(item.priority_rank)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn queue_item(&self, id: Uuid) -> Result<Option<QueueItemRow>> {
        let row =
            sqlx::query_as::<_, QueueItemRow>("SELECT * FROM labeling_queue WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    /// Queue items for a date, ordered by priority rank, optionally
    /// filtered by status.
    pub async fn queue_for_date(
        &self,
        date: NaiveDate,
        status: Option<QueueStatus>,
    ) -> Result<Vec<QueueItemRow>> {
        let rows = sqlx::query_as::<_, QueueItemRow>(
            r#"
            SELECT * FROM labeling_queue
            WHERE queue_date = $1
              AND ($2::text IS NULL OR status = $2)
            ORDER BY priority_rank ASC
            "#,
        )
        .bind(date)
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn queue_stats(&self, date: NaiveDate) -> Result<QueueStats> {
        let stats = sqlx::query_as::<_, QueueStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'labeled') AS labeled,
                COUNT(*) FILTER (WHERE status = 'skipped') AS skipped,
                AVG(uncertainty_score) AS avg_uncertainty,
                MAX(uncertainty_score) AS max_uncertainty,
                MIN(uncertainty_score) AS min_uncertainty
            FROM labeling_queue
            WHERE queue_date = $1
            "#,
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Transition pending → labeled, recording the correction and its
    /// mined keyword candidates in the same transaction.
    ///
    /// Fails with `InvalidState` if the item is already terminal and
    /// `NotFound` if it does not exist; neither leaves side effects.
    pub async fn submit_queue_label(
        &self,
        item_id: Uuid,
        user_score: f64,
        user_label: SentimentLabel,
        comment: Option<&str>,
        candidates: &[MinedCandidate],
    ) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        let item = sqlx::query_as::<_, QueueItemRow>(
            "SELECT * FROM labeling_queue WHERE id = $1 FOR UPDATE",
        )
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| TinPulseError::not_found(format!("queue item {item_id}")))?;

        if item.status() != QueueStatus::Pending {
            return Err(TinPulseError::invalid_state(format!(
                "queue item {item_id} is already {}",
                item.status
            )));
        }

        let feedback_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO feedback
                (article_id, title, url, predicted_score, predicted_label,
                 user_score, user_label, comment, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'admin')
            RETURNING id
            "#,
        )
        .bind(item.article_id)
        .bind(&item.title)
        .bind(&item.url)
        .bind(item.final_score)
        .bind(&item.final_label)
        .bind(user_score)
        .bind(user_label.as_str())
        .bind(comment)
        .fetch_one(&mut *tx)
        .await?;

        for candidate in candidates {
            upsert_candidate(&mut tx, candidate).await?;
        }

        sqlx::query(
            r#"
            UPDATE labeling_queue
            SET status = 'labeled',
                reviewer_score = $2,
                reviewer_label = $3,
                reviewer_comment = $4,
                feedback_id = $5,
                labeled_at = now()
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(user_score)
        .bind(user_label.as_str())
        .bind(comment)
        .bind(feedback_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(%item_id, %feedback_id, "Queue item labeled");
        Ok(feedback_id)
    }

    /// Transition pending → skipped. No feedback side effect.
    pub async fn skip_queue_item(&self, item_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE labeling_queue SET status = 'skipped' WHERE id = $1 AND status = 'pending'",
        )
        .bind(item_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing changed: distinguish a missing item from a terminal one.
        match self.queue_item(item_id).await? {
            None => Err(TinPulseError::not_found(format!("queue item {item_id}"))),
            Some(item) => Err(TinPulseError::invalid_state(format!(
                "queue item {item_id} is already {}",
                item.status
            ))),
        }
    }
}
