//! Article ingestion and retrieval.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use tinpulse_common::{Article, Result, ScrapedArticle, SentimentLabel, SentimentRecord};

use crate::Store;

impl Store {
    /// Persist a batch of scraped headlines for a crawl date.
    ///
    /// Uniqueness invariant: (source, title, crawl_date). Duplicates are
    /// silently dropped, not errors. Returns the number actually inserted.
    pub async fn insert_articles(
        &self,
        scraped: &[ScrapedArticle],
        crawl_date: NaiveDate,
    ) -> Result<u64> {
        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;

        for art in scraped {
            let result = sqlx::query(
                r#"
                INSERT INTO articles (source, title, url, published_at, crawl_date)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (source, title, crawl_date) DO NOTHING
                "#,
            )
            .bind(&art.source)
            .bind(&art.title)
            .bind(&art.url)
            .bind(art.published_at)
            .bind(crawl_date)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(
            total = scraped.len(),
            inserted,
            duplicates = scraped.len() as u64 - inserted,
            "Article batch stored"
        );
        Ok(inserted)
    }

    pub async fn article(&self, id: Uuid) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// All articles crawled on a given date, oldest first.
    pub async fn articles_for_date(&self, date: NaiveDate) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, Article>(
            r#"
            SELECT * FROM articles
            WHERE crawl_date = $1
            ORDER BY crawled_at ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Time-range query used by search and dashboards.
    pub async fn articles_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        source: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, Article>(
            r#"
            SELECT * FROM articles
            WHERE crawled_at >= $1
              AND crawled_at < $2
              AND ($3::text IS NULL OR source = $3)
            ORDER BY crawled_at DESC
            LIMIT $4
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(source)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Most recent crawl_date present, if any. Drives the daily queue build.
    pub async fn latest_crawl_date(&self) -> Result<Option<NaiveDate>> {
        let row = sqlx::query_scalar::<_, Option<NaiveDate>>(
            "SELECT MAX(crawl_date) FROM articles",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn sentiment_for_article(
        &self,
        article_id: Uuid,
    ) -> Result<Option<SentimentRecord>> {
        let row = sqlx::query_as::<_, SentimentRecord>(
            "SELECT * FROM sentiment_records WHERE article_id = $1",
        )
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Write (or overwrite on re-score) the sentiment computed for an
    /// article. Feedback never touches this row directly.
    pub async fn upsert_sentiment(
        &self,
        article_id: Uuid,
        score: f64,
        label: SentimentLabel,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sentiment_records (article_id, score, label, scored_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (article_id)
            DO UPDATE SET score = $2, label = $3, scored_at = now()
            "#,
        )
        .bind(article_id)
        .bind(score)
        .bind(label.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
