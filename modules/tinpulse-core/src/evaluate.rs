//! LLM-assisted labeling for queue items too uncertain to wait for a human.
//!
//! Two passes, both idempotent. The evaluate pass sends never-evaluated
//! high-uncertainty items to the batch annotator and caches the verdicts.
//! The sync pass turns confident cached verdicts into feedback rows, which
//! puts them through the same miner and aggregation path as human labels.

use std::sync::Arc;

use annotator_client::BatchAnnotator;
use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use tinpulse_common::{Config, Result};
use tinpulse_store::Store;

use crate::lexicon::LexiconCache;
use crate::miner;

/// Queue items below this uncertainty are considered settled enough that
/// spending annotator tokens on them is waste.
pub const DEFAULT_UNCERTAINTY_THRESHOLD: f64 = 0.35;

pub struct EvaluationService {
    store: Store,
    annotator: Arc<dyn BatchAnnotator>,
    lexicon: Arc<LexiconCache>,
    config: Config,
}

impl EvaluationService {
    pub fn new(
        store: Store,
        annotator: Arc<dyn BatchAnnotator>,
        lexicon: Arc<LexiconCache>,
        config: Config,
    ) -> Self {
        Self {
            store,
            annotator,
            lexicon,
            config,
        }
    }

    /// Annotate the most uncertain pending queue items of `date` that have
    /// no cached verdict yet. Returns the number of verdicts cached.
    pub async fn evaluate_queue(
        &self,
        date: NaiveDate,
        min_uncertainty: f64,
        limit: i64,
    ) -> Result<u64> {
        let items = self
            .store
            .unevaluated_uncertain_items(date, min_uncertainty, limit)
            .await?;
        if items.is_empty() {
            return Ok(0);
        }

        let batch: Vec<(Uuid, String)> = items
            .iter()
            .map(|item| (item.article_id, item.title.clone()))
            .collect();
        let batch_id = Uuid::new_v4().to_string();

        let annotations = self.annotator.annotate(&batch).await?;
        let cached = self
            .store
            .insert_evaluations(&annotations, self.annotator.model(), &batch_id)
            .await?;

        info!(%date, requested = batch.len(), cached, batch_id, "Annotator batch evaluated");
        Ok(cached)
    }

    /// Turn confident unsynced verdicts into feedback. Each sync runs the
    /// keyword miner with the verdict standing in for the human score, so
    /// LLM corrections grow the lexicon the same way human ones do.
    ///
    /// A verdict that fails to sync is logged and left unsynced for the
    /// next run; one bad row never aborts the batch.
    pub async fn sync_confident(&self) -> Result<u64> {
        let pending = self
            .store
            .unsynced_evaluations(self.config.annotator_min_confidence)
            .await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let lexicon = self.lexicon.get(&self.store, &self.config).await;
        let mut synced = 0u64;
        let mut mined_any = false;

        for evaluation in pending {
            let (predicted_score, predicted_label) = match evaluation.article_id {
                Some(article_id) => match self.store.sentiment_for_article(article_id).await? {
                    Some(record) => (record.score, record.label),
                    None => (0.0, "Neutral".to_string()),
                },
                None => (0.0, "Neutral".to_string()),
            };

            let candidates = miner::mine_candidates(
                &evaluation.title,
                evaluation.score,
                predicted_score,
                self.config.mining_error_threshold,
                &lexicon,
            );
            mined_any = mined_any || !candidates.is_empty();

            match self
                .store
                .sync_evaluation(evaluation.id, predicted_score, &predicted_label, &candidates)
                .await
            {
                Ok(_) => synced += 1,
                Err(e) => {
                    warn!(evaluation_id = %evaluation.id, error = %e, "Evaluation sync failed");
                }
            }
        }

        if mined_any {
            self.lexicon.invalidate();
        }
        info!(synced, "Confident evaluations synced into feedback");
        Ok(synced)
    }
}
