//! Keyword suggestions and human-approved learned keywords.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use tinpulse_common::{MinedCandidate, Result, SentimentType, TinPulseError};

use crate::Store;

/// A row from keyword_suggestions.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SuggestionRow {
    pub id: Uuid,
    pub keyword: String,
    pub sentiment_type: String,
    pub frequency: i64,
    pub avg_weight: f64,
    pub max_cooccurrence: i64,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A human-approved keyword with a fixed weight.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LearnedKeywordRow {
    pub id: Uuid,
    pub keyword: String,
    pub sentiment_type: String,
    pub weight: f64,
    pub approved_at: DateTime<Utc>,
}

/// Fold one mined candidate into keyword_suggestions inside an open
/// transaction. Append-and-increment, never destructive: a keyword seen
/// with the other sentiment type lives in its own row.
pub(crate) async fn upsert_candidate(
    tx: &mut Transaction<'_, Postgres>,
    candidate: &MinedCandidate,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO keyword_suggestions
            (keyword, sentiment_type, frequency, avg_weight, max_cooccurrence)
        VALUES ($1, $2, 1, $3, $4)
        ON CONFLICT (keyword, sentiment_type) DO UPDATE SET
            frequency = keyword_suggestions.frequency + 1,
            avg_weight = (keyword_suggestions.avg_weight * keyword_suggestions.frequency
                          + EXCLUDED.avg_weight)
                         / (keyword_suggestions.frequency + 1),
            max_cooccurrence = GREATEST(keyword_suggestions.max_cooccurrence,
                                        EXCLUDED.max_cooccurrence),
            last_seen = now()
        "#,
    )
    .bind(&candidate.keyword)
    .bind(candidate.sentiment_type.to_string())
    .bind(candidate.suggested_weight)
    .bind(candidate.cooccurrence)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

impl Store {
    /// Unreviewed suggestions last seen within the lookback window. Feed
    /// for the auto-aggregation engine.
    pub async fn suggestions_within(&self, lookback_days: i64) -> Result<Vec<SuggestionRow>> {
        let rows = sqlx::query_as::<_, SuggestionRow>(
            r#"
            SELECT * FROM keyword_suggestions
            WHERE reviewed = FALSE
              AND last_seen >= now() - ($1 || ' days')::interval
            "#,
        )
        .bind(lookback_days.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Suggestions awaiting human review, most frequent first.
    pub async fn pending_suggestions(&self, limit: i64) -> Result<Vec<SuggestionRow>> {
        let rows = sqlx::query_as::<_, SuggestionRow>(
            r#"
            SELECT * FROM keyword_suggestions
            WHERE reviewed = FALSE
            ORDER BY frequency DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Human rejection: the suggestion is permanently excluded from
    /// aggregation regardless of how often it keeps recurring.
    pub async fn reject_suggestion(
        &self,
        keyword: &str,
        sentiment_type: SentimentType,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE keyword_suggestions
            SET reviewed = TRUE
            WHERE keyword = $1 AND sentiment_type = $2
            "#,
        )
        .bind(keyword)
        .bind(sentiment_type.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TinPulseError::not_found(format!(
                "no suggestion for keyword '{keyword}' ({sentiment_type})"
            )));
        }
        Ok(())
    }

    /// Promote a keyword into the human-approved tier with a fixed weight.
    /// Outranks any auto-aggregated weight for the same term.
    pub async fn approve_keyword(
        &self,
        keyword: &str,
        sentiment_type: SentimentType,
        weight: f64,
    ) -> Result<()> {
        if weight <= 0.0 || weight > 1.0 {
            return Err(TinPulseError::validation(format!(
                "keyword weight must be in (0, 1], got {weight}"
            )));
        }
        sqlx::query(
            r#"
            INSERT INTO learned_keywords (keyword, sentiment_type, weight)
            VALUES ($1, $2, $3)
            ON CONFLICT (keyword)
            DO UPDATE SET sentiment_type = $2, weight = $3, approved_at = now()
            "#,
        )
        .bind(keyword)
        .bind(sentiment_type.to_string())
        .bind(weight)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn learned_keywords(&self) -> Result<Vec<LearnedKeywordRow>> {
        let rows = sqlx::query_as::<_, LearnedKeywordRow>(
            "SELECT * FROM learned_keywords ORDER BY weight DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
