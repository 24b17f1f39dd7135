//! Integration tests for Store.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::NaiveDate;
use uuid::Uuid;

use tinpulse_common::{
    FeedbackSource, MinedCandidate, NewFeedback, QueueStatus, ScrapedArticle, SentimentLabel,
    SentimentType, TinPulseError,
};
use tinpulse_store::{NewQueueItem, Store};

/// Get a migrated test store, or skip if no test DB is available.
async fn test_store() -> Option<Store> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let store = Store::connect(&url).await.ok()?;
    store.migrate().await.ok()?;

    // Clean slate for each test
    sqlx::query(
        "TRUNCATE articles, sentiment_records, feedback, labeling_queue, \
         keyword_suggestions, learned_keywords, llm_evaluations CASCADE",
    )
    .execute(store.pool())
    .await
    .ok()?;

    Some(store)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
}

fn scraped(source: &str, title: &str) -> ScrapedArticle {
    ScrapedArticle {
        source: source.to_string(),
        title: title.to_string(),
        url: format!("https://example.vn/{}", title.replace(' ', "-")),
        published_at: None,
    }
}

fn queue_item(article_id: Uuid, title: &str, date: NaiveDate, rank: i32) -> NewQueueItem {
    NewQueueItem {
        article_id,
        title: title.to_string(),
        url: String::new(),
        crawl_date: date,
        lexicon_score: 0.4,
        secondary_label: None,
        final_score: 0.4,
        final_label: SentimentLabel::Bullish.as_str().to_string(),
        uncertainty_score: 0.6,
        signal_conflict: 0.5,
        magnitude_uncertainty: 0.2,
        match_sparsity: 0.7,
        model_conflict: None,
        queue_date: date,
        priority_rank: rank,
    }
}

// =========================================================================
// Articles
// =========================================================================

#[tokio::test]
async fn duplicate_articles_are_dropped_on_write() {
    let Some(store) = test_store().await else {
        return;
    };

    let batch = vec![
        scraped("cafef", "VNM tăng mạnh phiên sáng"),
        scraped("cafef", "HPG giảm sâu sau tin xấu"),
    ];

    let first = store.insert_articles(&batch, day(20)).await.unwrap();
    assert_eq!(first, 2);

    // Same (source, title, crawl_date): silently skipped.
    let second = store.insert_articles(&batch, day(20)).await.unwrap();
    assert_eq!(second, 0);

    // A new crawl date is a new row.
    let next_day = store.insert_articles(&batch[..1], day(21)).await.unwrap();
    assert_eq!(next_day, 1);

    assert_eq!(store.count_articles_for_date(day(20)).await.unwrap(), 2);
}

#[tokio::test]
async fn latest_crawl_date_tracks_max() {
    let Some(store) = test_store().await else {
        return;
    };

    assert!(store.latest_crawl_date().await.unwrap().is_none());

    store
        .insert_articles(&[scraped("cafef", "a")], day(18))
        .await
        .unwrap();
    store
        .insert_articles(&[scraped("cafef", "b")], day(22))
        .await
        .unwrap();

    assert_eq!(store.latest_crawl_date().await.unwrap(), Some(day(22)));
}

// =========================================================================
// Queue state machine
// =========================================================================

#[tokio::test]
async fn queue_insert_is_idempotent() {
    let Some(store) = test_store().await else {
        return;
    };

    store
        .insert_articles(&[scraped("cafef", "VIC bứt phá")], day(20))
        .await
        .unwrap();
    let article = &store.articles_for_date(day(20)).await.unwrap()[0];

    let items = vec![queue_item(article.id, &article.title, day(20), 1)];
    assert_eq!(store.insert_queue_items(&items).await.unwrap(), 1);
    assert_eq!(store.insert_queue_items(&items).await.unwrap(), 0);

    let queued = store.queue_for_date(day(20), None).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].status(), QueueStatus::Pending);
}

#[tokio::test]
async fn submit_labels_item_and_records_feedback_atomically() {
    let Some(store) = test_store().await else {
        return;
    };

    store
        .insert_articles(&[scraped("cafef", "VIC bứt phá mạnh")], day(20))
        .await
        .unwrap();
    let article = &store.articles_for_date(day(20)).await.unwrap()[0];
    store
        .insert_queue_items(&[queue_item(article.id, &article.title, day(20), 1)])
        .await
        .unwrap();
    let item = &store.queue_for_date(day(20), None).await.unwrap()[0];

    let candidates = vec![MinedCandidate {
        keyword: "bứt phá".to_string(),
        sentiment_type: SentimentType::Positive,
        suggested_weight: 0.5,
        cooccurrence: 1,
    }];

    let feedback_id = store
        .submit_queue_label(item.id, 0.8, SentimentLabel::Bullish, Some("clear"), &candidates)
        .await
        .unwrap();

    let labeled = store.queue_item(item.id).await.unwrap().unwrap();
    assert_eq!(labeled.status(), QueueStatus::Labeled);
    assert_eq!(labeled.feedback_id, Some(feedback_id));
    assert_eq!(labeled.reviewer_score, Some(0.8));
    assert!(labeled.labeled_at.is_some());

    assert_eq!(store.count_feedback().await.unwrap(), 1);
    assert_eq!(store.pending_suggestions(10).await.unwrap().len(), 1);

    // Second submit fails with no new side effects.
    let err = store
        .submit_queue_label(item.id, -0.5, SentimentLabel::Bearish, None, &candidates)
        .await
        .unwrap_err();
    assert!(matches!(err, TinPulseError::InvalidState(_)));
    assert_eq!(store.count_feedback().await.unwrap(), 1);
    let suggestion = &store.pending_suggestions(10).await.unwrap()[0];
    assert_eq!(suggestion.frequency, 1);
}

#[tokio::test]
async fn skip_distinguishes_missing_from_terminal() {
    let Some(store) = test_store().await else {
        return;
    };

    let err = store.skip_queue_item(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, TinPulseError::NotFound(_)));

    store
        .insert_articles(&[scraped("cafef", "thị trường đi ngang")], day(20))
        .await
        .unwrap();
    let article = &store.articles_for_date(day(20)).await.unwrap()[0];
    store
        .insert_queue_items(&[queue_item(article.id, &article.title, day(20), 1)])
        .await
        .unwrap();
    let item = &store.queue_for_date(day(20), None).await.unwrap()[0];

    store.skip_queue_item(item.id).await.unwrap();
    assert_eq!(
        store.queue_item(item.id).await.unwrap().unwrap().status(),
        QueueStatus::Skipped
    );

    // Skipped is terminal.
    let err = store.skip_queue_item(item.id).await.unwrap_err();
    assert!(matches!(err, TinPulseError::InvalidState(_)));
}

#[tokio::test]
async fn unqueued_articles_excludes_already_queued() {
    let Some(store) = test_store().await else {
        return;
    };

    store
        .insert_articles(
            &[scraped("cafef", "one"), scraped("cafef", "two")],
            day(20),
        )
        .await
        .unwrap();
    let articles = store.articles_for_date(day(20)).await.unwrap();

    store
        .insert_queue_items(&[queue_item(articles[0].id, &articles[0].title, day(20), 1)])
        .await
        .unwrap();

    let remaining = store.unqueued_articles(day(20)).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, articles[1].id);
}

// =========================================================================
// Suggestions and feedback
// =========================================================================

#[tokio::test]
async fn repeated_candidates_fold_into_running_mean() {
    let Some(store) = test_store().await else {
        return;
    };

    let feedback = NewFeedback {
        article_id: None,
        title: "VNM tăng mạnh".to_string(),
        url: String::new(),
        predicted_score: 0.0,
        predicted_label: SentimentLabel::Neutral,
        user_score: 0.6,
        user_label: SentimentLabel::Bullish,
        comment: None,
        source: FeedbackSource::Admin,
    };
    let candidate = |w: f64, co: i64| MinedCandidate {
        keyword: "tăng mạnh".to_string(),
        sentiment_type: SentimentType::Positive,
        suggested_weight: w,
        cooccurrence: co,
    };

    store
        .insert_feedback(&feedback, &[candidate(0.4, 1)])
        .await
        .unwrap();
    store
        .insert_feedback(&feedback, &[candidate(0.8, 3)])
        .await
        .unwrap();

    let suggestions = store.suggestions_within(30).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    let row = &suggestions[0];
    assert_eq!(row.frequency, 2);
    assert!((row.avg_weight - 0.6).abs() < 1e-9);
    assert_eq!(row.max_cooccurrence, 3);
}

#[tokio::test]
async fn rejected_suggestions_leave_the_aggregation_feed() {
    let Some(store) = test_store().await else {
        return;
    };

    let feedback = NewFeedback {
        article_id: None,
        title: "cổ phiếu hôm nay".to_string(),
        url: String::new(),
        predicted_score: 0.2,
        predicted_label: SentimentLabel::SomewhatBullish,
        user_score: -0.4,
        user_label: SentimentLabel::Bearish,
        comment: None,
        source: FeedbackSource::Admin,
    };
    store
        .insert_feedback(
            &feedback,
            &[MinedCandidate {
                keyword: "hôm nay".to_string(),
                sentiment_type: SentimentType::Negative,
                suggested_weight: 0.3,
                cooccurrence: 0,
            }],
        )
        .await
        .unwrap();

    store
        .reject_suggestion("hôm nay", SentimentType::Negative)
        .await
        .unwrap();

    assert!(store.suggestions_within(30).await.unwrap().is_empty());
    assert!(store.pending_suggestions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn approve_keyword_validates_weight() {
    let Some(store) = test_store().await else {
        return;
    };

    let err = store
        .approve_keyword("tăng trần", SentimentType::Positive, 1.5)
        .await
        .unwrap_err();
    assert!(matches!(err, TinPulseError::Validation(_)));

    store
        .approve_keyword("tăng trần", SentimentType::Positive, 0.9)
        .await
        .unwrap();
    let learned = store.learned_keywords().await.unwrap();
    assert_eq!(learned.len(), 1);
    assert_eq!(learned[0].keyword, "tăng trần");
}

// =========================================================================
// Evaluation sync
// =========================================================================

#[tokio::test]
async fn evaluation_sync_is_exactly_once() {
    let Some(store) = test_store().await else {
        return;
    };

    let annotation = tinpulse_common::Annotation {
        article_id: None,
        title: "lợi nhuận vượt kế hoạch".to_string(),
        score: 0.7,
        label: SentimentLabel::Bullish,
        confidence: 0.9,
        reasoning: "earnings beat".to_string(),
    };
    store
        .insert_evaluations(&[annotation], "gpt-4o-mini", "batch-1")
        .await
        .unwrap();

    let unsynced = store.unsynced_evaluations(0.6).await.unwrap();
    assert_eq!(unsynced.len(), 1);

    store
        .sync_evaluation(unsynced[0].id, 0.1, "Neutral", &[])
        .await
        .unwrap();
    assert_eq!(store.count_feedback().await.unwrap(), 1);
    assert!(store.unsynced_evaluations(0.6).await.unwrap().is_empty());

    let err = store
        .sync_evaluation(unsynced[0].id, 0.1, "Neutral", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, TinPulseError::InvalidState(_)));
    assert_eq!(store.count_feedback().await.unwrap(), 1);
}

#[tokio::test]
async fn low_confidence_evaluations_are_not_offered_for_sync() {
    let Some(store) = test_store().await else {
        return;
    };

    let annotation = tinpulse_common::Annotation {
        article_id: None,
        title: "diễn biến khó lường".to_string(),
        score: 0.1,
        label: SentimentLabel::Neutral,
        confidence: 0.4,
        reasoning: "ambiguous".to_string(),
    };
    store
        .insert_evaluations(&[annotation], "gpt-4o-mini", "batch-2")
        .await
        .unwrap();

    assert!(store.unsynced_evaluations(0.6).await.unwrap().is_empty());
}
