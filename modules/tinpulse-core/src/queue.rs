//! Daily labeling queue: pick the headlines a human should look at.
//!
//! Building a queue scores every not-yet-queued article of a crawl date,
//! ranks by uncertainty, and persists the top slice with its full scoring
//! snapshot. Review submissions then flow back through the miner so the
//! correction and its keyword candidates land atomically.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use tinpulse_common::{Config, QueueStatus, Result, SentimentLabel, TinPulseError};
use tinpulse_store::{NewQueueItem, QueueBuildCounts, QueueItemRow, QueueStats, Store};

use crate::lexicon::LexiconCache;
use crate::miner;
use crate::scorer::{self, DirectionClassifier};
use crate::uncertainty::{self, UncertaintyWeights};

pub const MAX_QUEUE_SIZE: usize = 100;

pub struct QueueService {
    store: Store,
    lexicon: Arc<LexiconCache>,
    classifier: Arc<dyn DirectionClassifier>,
    config: Config,
}

impl QueueService {
    pub fn new(
        store: Store,
        lexicon: Arc<LexiconCache>,
        classifier: Arc<dyn DirectionClassifier>,
        config: Config,
    ) -> Self {
        Self {
            store,
            lexicon,
            classifier,
            config,
        }
    }

    fn weights(&self) -> UncertaintyWeights {
        UncertaintyWeights {
            base: self.config.uncertainty_weights_base,
            extended: self.config.uncertainty_weights_extended,
        }
    }

    /// Score all unqueued articles of `date` and enqueue the `limit` most
    /// uncertain. Re-running is idempotent for articles already queued.
    pub async fn build_queue(&self, date: NaiveDate, limit: usize) -> Result<QueueBuildCounts> {
        if limit == 0 || limit > MAX_QUEUE_SIZE {
            return Err(TinPulseError::validation(format!(
                "queue size must be between 1 and {MAX_QUEUE_SIZE}, got {limit}"
            )));
        }

        let total_candidates = self.store.count_articles_for_date(date).await? as u64;
        let articles = self.store.unqueued_articles(date).await?;
        let already_queued = total_candidates - articles.len() as u64;

        let lexicon = self.lexicon.get(&self.store, &self.config).await;
        let weights = self.weights();

        let mut scored = Vec::with_capacity(articles.len());
        for article in articles {
            let outcome = scorer::score_text(
                &article.title,
                &lexicon,
                self.classifier.as_ref(),
                self.config.blend_ratio,
            )
            .await;
            let snapshot = uncertainty::assess(&outcome, None, &weights);
            scored.push((article, snapshot));
        }

        // Most uncertain first; crawl order breaks ties deterministically.
        scored.sort_by(|(a, sa), (b, sb)| {
            sb.uncertainty_score
                .partial_cmp(&sa.uncertainty_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.crawled_at.cmp(&b.crawled_at))
        });

        let items: Vec<NewQueueItem> = scored
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(rank, (article, snapshot))| NewQueueItem {
                article_id: article.id,
                title: article.title,
                url: article.url,
                crawl_date: article.crawl_date,
                lexicon_score: snapshot.lexicon_score,
                secondary_label: snapshot.secondary_label.map(|d| d.to_string()),
                final_score: snapshot.final_score,
                final_label: snapshot.final_label.as_str().to_string(),
                uncertainty_score: snapshot.uncertainty_score,
                signal_conflict: snapshot.signal_conflict,
                magnitude_uncertainty: snapshot.magnitude_uncertainty,
                match_sparsity: snapshot.match_sparsity,
                model_conflict: snapshot.model_conflict,
                queue_date: date,
                priority_rank: rank as i32 + 1,
            })
            .collect();

        let inserted = self.store.insert_queue_items(&items).await?;
        info!(%date, inserted, already_queued, total_candidates, "Labeling queue built");

        Ok(QueueBuildCounts {
            inserted,
            already_queued,
            total_candidates,
        })
    }

    /// Record a human label for a pending queue item. The label, derived
    /// five-way bucket, and any mined keyword candidates commit together.
    pub async fn submit(
        &self,
        item_id: Uuid,
        user_score: f64,
        comment: Option<&str>,
    ) -> Result<Uuid> {
        if !(-1.0..=1.0).contains(&user_score) {
            return Err(TinPulseError::validation(format!(
                "score must be within [-1, 1], got {user_score}"
            )));
        }

        let item = self
            .store
            .queue_item(item_id)
            .await?
            .ok_or_else(|| TinPulseError::not_found(format!("queue item {item_id}")))?;

        let lexicon = self.lexicon.get(&self.store, &self.config).await;
        let candidates = miner::mine_candidates(
            &item.title,
            user_score,
            item.final_score,
            self.config.mining_error_threshold,
            &lexicon,
        );

        let user_label = SentimentLabel::from_score(user_score);
        let feedback_id = self
            .store
            .submit_queue_label(item_id, user_score, user_label, comment, &candidates)
            .await?;

        if !candidates.is_empty() {
            // New suggestions may cross the promotion thresholds.
            self.lexicon.invalidate();
        }
        Ok(feedback_id)
    }

    pub async fn skip(&self, item_id: Uuid) -> Result<()> {
        self.store.skip_queue_item(item_id).await
    }

    /// Pending items for a date in priority order.
    pub async fn pending(&self, date: NaiveDate) -> Result<Vec<QueueItemRow>> {
        self.store
            .queue_for_date(date, Some(QueueStatus::Pending))
            .await
    }

    pub async fn stats(&self, date: NaiveDate) -> Result<QueueStats> {
        self.store.queue_stats(date).await
    }
}
