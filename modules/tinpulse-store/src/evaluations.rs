//! Cached LLM annotations and their sync into the feedback stream.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use tinpulse_common::{Annotation, MinedCandidate, Result, TinPulseError};

use crate::keywords::upsert_candidate;
use crate::queue::QueueItemRow;
use crate::Store;

/// A cached annotator verdict for one article.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EvaluationRow {
    pub id: Uuid,
    pub article_id: Option<Uuid>,
    pub title: String,
    pub score: f64,
    pub label: String,
    pub confidence: f64,
    pub reasoning: String,
    pub model: String,
    pub batch_id: String,
    pub evaluated_at: DateTime<Utc>,
    pub synced: bool,
}

impl Store {
    /// Persist a batch of annotator verdicts. Verdicts are cached so the
    /// same article is never sent to the annotator twice.
    pub async fn insert_evaluations(
        &self,
        annotations: &[Annotation],
        model: &str,
        batch_id: &str,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for annotation in annotations {
            let result = sqlx::query(
                r#"
                INSERT INTO llm_evaluations
                    (article_id, title, score, label, confidence, reasoning, model, batch_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(annotation.article_id)
            .bind(&annotation.title)
            .bind(annotation.score)
            .bind(annotation.label.as_str())
            .bind(annotation.confidence)
            .bind(&annotation.reasoning)
            .bind(model)
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(inserted, batch_id, "Cached annotator evaluations");
        Ok(inserted)
    }

    pub async fn evaluation_for_article(
        &self,
        article_id: Uuid,
    ) -> Result<Option<EvaluationRow>> {
        let row = sqlx::query_as::<_, EvaluationRow>(
            r#"
            SELECT * FROM llm_evaluations
            WHERE article_id = $1
            ORDER BY evaluated_at DESC
            LIMIT 1
            "#,
        )
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Pending queue items above the uncertainty threshold that have no
    /// cached evaluation yet, most uncertain first.
    pub async fn unevaluated_uncertain_items(
        &self,
        date: NaiveDate,
        min_uncertainty: f64,
        limit: i64,
    ) -> Result<Vec<QueueItemRow>> {
        let rows = sqlx::query_as::<_, QueueItemRow>(
            r#"
            SELECT q.* FROM labeling_queue q
            WHERE q.queue_date = $1
              AND q.status = 'pending'
              AND q.uncertainty_score >= $2
              AND NOT EXISTS (
                  SELECT 1 FROM llm_evaluations e WHERE e.article_id = q.article_id
              )
            ORDER BY q.uncertainty_score DESC, q.priority_rank ASC
            LIMIT $3
            "#,
        )
        .bind(date)
        .bind(min_uncertainty)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Evaluations confident enough to act on that have not been turned
    /// into feedback yet.
    pub async fn unsynced_evaluations(&self, min_confidence: f64) -> Result<Vec<EvaluationRow>> {
        let rows = sqlx::query_as::<_, EvaluationRow>(
            r#"
            SELECT * FROM llm_evaluations
            WHERE synced = FALSE AND confidence >= $1
            ORDER BY evaluated_at ASC
            "#,
        )
        .bind(min_confidence)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Turn one evaluation into a feedback row, fold its mined keyword
    /// candidates, and mark it synced, in a single transaction so a crash
    /// cannot double-sync it.
    pub async fn sync_evaluation(
        &self,
        evaluation_id: Uuid,
        predicted_score: f64,
        predicted_label: &str,
        candidates: &[MinedCandidate],
    ) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        let evaluation = sqlx::query_as::<_, EvaluationRow>(
            "SELECT * FROM llm_evaluations WHERE id = $1 FOR UPDATE",
        )
        .bind(evaluation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| TinPulseError::not_found(format!("evaluation {evaluation_id}")))?;

        if evaluation.synced {
            return Err(TinPulseError::invalid_state(format!(
                "evaluation {evaluation_id} is already synced"
            )));
        }

        let feedback_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO feedback
                (article_id, title, predicted_score, predicted_label,
                 user_score, user_label, comment, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'llm')
            RETURNING id
            "#,
        )
        .bind(evaluation.article_id)
        .bind(&evaluation.title)
        .bind(predicted_score)
        .bind(predicted_label)
        .bind(evaluation.score)
        .bind(&evaluation.label)
        .bind(&evaluation.reasoning)
        .fetch_one(&mut *tx)
        .await?;

        for candidate in candidates {
            upsert_candidate(&mut tx, candidate).await?;
        }

        sqlx::query("UPDATE llm_evaluations SET synced = TRUE WHERE id = $1")
            .bind(evaluation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(feedback_id)
    }
}
