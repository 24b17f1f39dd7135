//! Daily pipeline runner: re-score the latest crawl, build the labeling
//! queue, and, when an annotator key is configured, evaluate and sync the
//! most uncertain items.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use annotator_client::OpenAiAnnotator;
use tinpulse_common::Config;
use tinpulse_core::{evaluate, SentimentEngine};
use tinpulse_store::Store;

const QUEUE_SIZE: usize = 20;
const EVALUATION_BATCH_LIMIT: i64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tinpulse=info".parse()?))
        .init();

    info!("TinPulse daily run starting");

    let config = Config::from_env();
    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;

    let Some(date) = store.latest_crawl_date().await? else {
        warn!("No articles in the store yet, nothing to do");
        return Ok(());
    };

    let engine = SentimentEngine::new(store.clone(), config.clone());
    let scored = engine.rescore_date(date).await?;
    info!(%date, scored, "Re-scored latest crawl");

    let queue = engine.queue_service();
    let counts = queue.build_queue(date, QUEUE_SIZE).await?;
    info!(
        %date,
        inserted = counts.inserted,
        already_queued = counts.already_queued,
        total_candidates = counts.total_candidates,
        "Labeling queue ready"
    );

    if config.annotator_api_key.is_empty() {
        info!("No annotator key configured, skipping LLM evaluation");
    } else {
        let annotator = Arc::new(OpenAiAnnotator::new(
            &config.annotator_api_key,
            &config.annotator_base_url,
            &config.annotator_model,
        ));
        let evaluator = engine.evaluation_service(annotator);
        let cached = evaluator
            .evaluate_queue(
                date,
                evaluate::DEFAULT_UNCERTAINTY_THRESHOLD,
                EVALUATION_BATCH_LIMIT,
            )
            .await?;
        let synced = evaluator.sync_confident().await?;
        info!(cached, synced, "LLM evaluation pass complete");
    }

    let stats = queue.stats(date).await?;
    info!(
        total = stats.total,
        pending = stats.pending,
        labeled = stats.labeled,
        skipped = stats.skipped,
        "Daily run finished"
    );
    Ok(())
}
