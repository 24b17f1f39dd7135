//! Top-level scoring engine: ingest headlines, score them against the
//! current merged lexicon, and hand out the queue and evaluation services
//! that share its store and caches.

use std::sync::Arc;

use annotator_client::BatchAnnotator;
use chrono::NaiveDate;
use tracing::info;

use tinpulse_common::{Config, Result, ScrapedArticle};
use tinpulse_store::Store;

use crate::evaluate::EvaluationService;
use crate::lexicon::LexiconCache;
use crate::queue::QueueService;
use crate::scorer::{self, DirectionClassifier, NoSecondary, ScoreOutcome};

pub struct SentimentEngine {
    store: Store,
    lexicon: Arc<LexiconCache>,
    classifier: Arc<dyn DirectionClassifier>,
    config: Config,
}

impl SentimentEngine {
    /// Engine with no secondary direction classifier wired in.
    pub fn new(store: Store, config: Config) -> Self {
        Self::with_classifier(store, config, Arc::new(NoSecondary))
    }

    pub fn with_classifier(
        store: Store,
        config: Config,
        classifier: Arc<dyn DirectionClassifier>,
    ) -> Self {
        let lexicon = Arc::new(LexiconCache::from_config(&config));
        Self {
            store,
            lexicon,
            classifier,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn queue_service(&self) -> QueueService {
        QueueService::new(
            self.store.clone(),
            Arc::clone(&self.lexicon),
            Arc::clone(&self.classifier),
            self.config.clone(),
        )
    }

    pub fn evaluation_service(&self, annotator: Arc<dyn BatchAnnotator>) -> EvaluationService {
        EvaluationService::new(
            self.store.clone(),
            annotator,
            Arc::clone(&self.lexicon),
            self.config.clone(),
        )
    }

    /// Score one text against the current merged lexicon.
    pub async fn score(&self, text: &str) -> ScoreOutcome {
        let lexicon = self.lexicon.get(&self.store, &self.config).await;
        scorer::score_text(
            text,
            &lexicon,
            self.classifier.as_ref(),
            self.config.blend_ratio,
        )
        .await
    }

    /// Persist scraped headlines for a crawl date and score the ones that
    /// landed. Duplicates are dropped by the store, so the sentiment rows
    /// written here are exactly the articles of that date.
    pub async fn ingest(&self, scraped: &[ScrapedArticle], date: NaiveDate) -> Result<u64> {
        let inserted = self.store.insert_articles(scraped, date).await?;
        let scored = self.rescore_date(date).await?;
        info!(%date, inserted, scored, "Headlines ingested and scored");
        Ok(inserted)
    }

    /// Re-score every article of a crawl date against the current merged
    /// lexicon, overwriting previous sentiment rows. Run after lexicon
    /// changes to propagate learned keywords into stored scores.
    pub async fn rescore_date(&self, date: NaiveDate) -> Result<u64> {
        let articles = self.store.articles_for_date(date).await?;
        let lexicon = self.lexicon.get(&self.store, &self.config).await;

        let mut scored = 0u64;
        for article in &articles {
            let outcome = scorer::score_text(
                &article.title,
                &lexicon,
                self.classifier.as_ref(),
                self.config.blend_ratio,
            )
            .await;
            self.store
                .upsert_sentiment(article.id, outcome.final_score, outcome.final_label)
                .await?;
            scored += 1;
        }
        Ok(scored)
    }

    /// Drop the cached lexicon so the next score rebuilds it.
    pub fn invalidate_lexicon(&self) {
        self.lexicon.invalidate();
    }
}
