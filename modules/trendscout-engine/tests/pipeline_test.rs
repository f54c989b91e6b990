use std::sync::Arc;
use std::time::Duration;

use ai_client::testing::ScriptedProvider;
use ai_client::ProviderKind;
use serde_json::json;

use trendscout_collectors::testing::{FailingCollector, StaticCollector};
use trendscout_collectors::{Collector, CollectorManager};
use trendscout_common::{
    Config, IdeaCategory, NarrativeStatus, SignalSource, TrendDirection, TrendScoutError,
};
use trendscout_engine::{AnalysisPipeline, AnalysisStore, PipelinePhase};

fn manager(collectors: Vec<Arc<dyn Collector>>) -> CollectorManager {
    CollectorManager::new(collectors)
}

fn github(signals: &[(&str, f64)]) -> Arc<dyn Collector> {
    Arc::new(StaticCollector::new(SignalSource::Github, signals))
}

fn narratives_reply(narratives: serde_json::Value) -> String {
    json!({ "narratives": narratives }).to_string()
}

fn ideas_reply(ideas: serde_json::Value) -> String {
    json!({ "ideas": ideas }).to_string()
}

fn pipeline(collectors: Vec<Arc<dyn Collector>>, provider: Arc<ScriptedProvider>) -> AnalysisPipeline {
    AnalysisPipeline::new(manager(collectors), provider).with_idea_call_delay(Duration::ZERO)
}

#[tokio::test]
async fn detection_failure_yields_empty_narratives_and_error() {
    let provider = Arc::new(ScriptedProvider::new().fail_http(500, "model down"));
    let pipeline = pipeline(
        vec![
            github(&[("anchor", 70.0)]),
            Arc::new(FailingCollector::new(SignalSource::News, "feed unreachable")),
        ],
        provider.clone(),
    );

    let result = pipeline.run().await;

    assert!(result.narratives.is_empty());
    assert_eq!(result.all_signals.len(), 1);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors[0].contains("feed unreachable"));
    assert!(result.errors[1].starts_with("Narrative detection failed: "));
    assert_eq!(provider.calls().len(), 1);
    assert_eq!(result.metadata.narrative_count, 0);
    assert_eq!(result.metadata.idea_count, 0);
}

#[tokio::test]
async fn missing_narrative_fields_get_defaults() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond(&narratives_reply(json!([
                { "title": "Compressed NFTs", "description": "d", "explanation": "e" }
            ])))
            .respond(&ideas_reply(json!([]))),
    );
    let result = pipeline(vec![github(&[("bubblegum", 60.0)])], provider).run().await;

    let n = &result.narratives[0];
    assert_eq!(n.status, NarrativeStatus::Emerging);
    assert_eq!(n.confidence_score, 70);
    assert_eq!(n.trend_direction, TrendDirection::Up);
    assert!(n.tags.is_empty());
    assert_eq!(n.slug, "compressed-nfts");
}

#[tokio::test]
async fn related_indices_resolve_against_full_signal_list() {
    let titles: Vec<String> = (0..40).map(|i| format!("signal-{i}")).collect();
    let signals: Vec<(&str, f64)> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), 90.0 - i as f64))
        .collect();

    let provider = Arc::new(
        ScriptedProvider::new()
            .respond(&narratives_reply(json!([
                { "title": "T", "description": "d", "explanation": "e", "relatedSignalIndices": [0, 999] }
            ])))
            .respond(&ideas_reply(json!([]))),
    );
    let result = pipeline(vec![github(&signals)], provider).run().await;

    let resolved = &result.narratives[0].signals;
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].signal.title(), "signal-0");
    assert_eq!(resolved[0].created_at, result.metadata.completed_at);
}

#[tokio::test(start_paused = true)]
async fn idea_generation_is_sequential_and_failure_isolated() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond(&narratives_reply(json!([
                { "title": "One", "description": "d", "explanation": "e" },
                { "title": "Two", "description": "d", "explanation": "e" },
                { "title": "Three", "description": "d", "explanation": "e" }
            ])))
            .respond(&ideas_reply(json!([{ "title": "first idea", "score": 90 }])))
            .fail_http(429, "slow down")
            .respond(&ideas_reply(json!([{ "title": "third idea" }, { "title": "another" }]))),
    );
    let pipeline = AnalysisPipeline::new(manager(vec![github(&[("s", 50.0)])]), provider.clone())
        .with_idea_call_delay(Duration::from_secs(2));

    let started = tokio::time::Instant::now();
    let result = pipeline.run().await;

    assert!(started.elapsed() >= Duration::from_secs(4));
    let counts: Vec<usize> = result.narratives.iter().map(|n| n.ideas.len()).collect();
    assert_eq!(counts, vec![1, 0, 2]);
    assert_eq!(result.metadata.idea_count, 3);
    assert_eq!(provider.calls().len(), 4);

    let idea = &result.narratives[0].ideas[0];
    assert_eq!(idea.narrative_id, result.narratives[0].id);
    assert_eq!(idea.score, 90);
    assert_eq!(result.narratives[2].ideas[0].score, 50);
}

#[tokio::test]
async fn signals_are_ranked_across_collectors() {
    let provider = Arc::new(ScriptedProvider::new().respond(&narratives_reply(json!([]))));
    let result = pipeline(
        vec![
            github(&[("low", 20.0), ("high", 95.0)]),
            Arc::new(StaticCollector::new(SignalSource::Social, &[("mid", 60.0)])),
        ],
        provider,
    )
    .run()
    .await;

    let titles: Vec<&str> = result.all_signals.iter().map(|s| s.title()).collect();
    assert_eq!(titles, vec!["high", "mid", "low"]);
    assert_eq!(result.metadata.signal_count, 3);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn phase_ends_at_complete() {
    let provider = Arc::new(ScriptedProvider::new().respond(&narratives_reply(json!([]))));
    let pipeline = pipeline(vec![github(&[("s", 50.0)])], provider);
    let mut phases = pipeline.subscribe();
    assert_eq!(pipeline.phase(), PipelinePhase::Idle);

    pipeline.run().await;

    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), PipelinePhase::Complete);
    assert_eq!(pipeline.phase(), PipelinePhase::Complete);
}

#[tokio::test]
async fn result_serializes_camel_case() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond(&narratives_reply(json!([{ "title": "X", "description": "d", "explanation": "e" }])))
            .respond(&ideas_reply(json!([{ "title": "Y", "targetAudience": "traders" }]))),
    );
    let result = pipeline(vec![github(&[("s", 50.0)])], provider).run().await;
    let value = serde_json::to_value(&result).unwrap();

    assert!(value["allSignals"].is_array());
    assert!(value["metadata"]["duration"].is_i64());
    assert_eq!(value["narratives"][0]["ideas"][0]["targetAudience"], "traders");
    assert!(value["narratives"][0]["fortnightPeriod"].as_str().unwrap().contains('_'));
}

#[test]
fn from_config_requires_selected_provider_key() {
    let config = Config {
        llm_provider: ProviderKind::OpenAi,
        groq_api_key: "gsk-present".to_string(),
        ..Config::default()
    };

    match AnalysisPipeline::from_config(&config) {
        Err(TrendScoutError::Config(msg)) => assert_eq!(msg, "OPENAI_API_KEY is not set"),
        Err(other) => panic!("expected Config error, got {other:?}"),
        Ok(_) => panic!("expected Config error, got a pipeline"),
    }

    let config = Config {
        openai_api_key: "sk-present".to_string(),
        ..config
    };
    assert!(AnalysisPipeline::from_config(&config).is_ok());
}

// --- Store ---

#[tokio::test(start_paused = true)]
async fn store_rejects_concurrent_run() {
    let provider = Arc::new(ScriptedProvider::new().respond(&narratives_reply(json!([]))));
    let slow: Arc<dyn Collector> = Arc::new(
        StaticCollector::new(SignalSource::Onchain, &[("tps", 80.0)])
            .with_delay(Duration::from_secs(5)),
    );
    let pipeline = pipeline(vec![slow], provider);
    let store = AnalysisStore::new();

    let (first, second) = tokio::join!(store.run(&pipeline), store.run(&pipeline));

    assert!(first.is_ok());
    assert!(matches!(second, Err(TrendScoutError::RunInProgress)));
    assert!(!store.is_analyzing());

    let status = store.status();
    assert!(!status.is_analyzing);
    assert_eq!(status.metadata.map(|m| m.signal_count), Some(1));
    assert!(status.last_analyzed_at.is_some());
}

#[test]
fn run_guard_releases_on_drop() {
    let store = AnalysisStore::new();
    let guard = store.try_begin_run().unwrap();
    assert!(store.is_analyzing());
    assert!(store.try_begin_run().is_none());

    drop(guard);
    assert!(!store.is_analyzing());
    assert!(store.try_begin_run().is_some());
}

#[test]
fn empty_store_answers_with_nothing() {
    let store = AnalysisStore::new();

    assert!(store.latest().is_none());
    assert!(store.narrative("anything").is_none());
    assert!(store.narrative_summaries().is_empty());
    assert!(store.ideas(None).is_empty());

    let page = store.signals(None, 0, 0);
    assert!(page.signals.is_empty());
    assert_eq!((page.total, page.page, page.page_size), (0, 1, 20));

    let status = store.status();
    assert!(!status.is_analyzing);
    assert!(status.last_analyzed_at.is_none());
}

#[tokio::test]
async fn queries_read_the_published_result() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .respond(&narratives_reply(json!([
                { "title": "Onchain Payments", "description": "d", "explanation": "e", "relatedSignalIndices": [0, 1] },
                { "title": "AI Agents", "description": "d", "explanation": "e", "relatedSignalIndices": [2] }
            ])))
            .respond(&ideas_reply(json!([
                { "title": "Merchant SDK", "category": "payments", "score": 72 },
                { "title": "Payroll", "category": "payments", "score": 91 }
            ])))
            .respond(&ideas_reply(json!([
                { "title": "Agent Wallet", "category": "ai", "score": 80 }
            ]))),
    );
    let signals: Vec<(String, f64)> = (0..25).map(|i| (format!("gh-{i}"), 99.0 - i as f64)).collect();
    let signals: Vec<(&str, f64)> = signals.iter().map(|(t, s)| (t.as_str(), *s)).collect();
    let pipeline = pipeline(
        vec![
            github(&signals),
            Arc::new(StaticCollector::new(SignalSource::News, &[("headline", 10.0)])),
        ],
        provider,
    );
    let store = AnalysisStore::new();
    let result = store.run(&pipeline).await.unwrap();

    // Lookup by slug and by id
    let payments = store.narrative("onchain-payments").unwrap();
    assert_eq!(payments.signals.len(), 2);
    let by_id = store.narrative(&result.narratives[1].id.to_string()).unwrap();
    assert_eq!(by_id.title, "AI Agents");

    let summaries = store.narrative_summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!((summaries[0].signal_count, summaries[0].idea_count), (2, 2));
    let summary_json = serde_json::to_value(&summaries[0]).unwrap();
    assert!(summary_json.get("signals").is_none());
    assert_eq!(summary_json["signalCount"], 2);

    let ideas: Vec<u8> = store.ideas(None).iter().map(|l| l.idea.score).collect();
    assert_eq!(ideas, vec![91, 80, 72]);
    let ai = store.ideas(Some(IdeaCategory::Ai));
    assert_eq!(ai.len(), 1);
    assert_eq!(ai[0].narrative_slug, "ai-agents");
    assert_eq!(ai[0].narrative_title, "AI Agents");
    let listing_json = serde_json::to_value(&ai[0]).unwrap();
    assert_eq!(listing_json["title"], "Agent Wallet");
    assert_eq!(listing_json["narrativeSlug"], "ai-agents");

    let first = store.signals(None, 1, 20);
    assert_eq!((first.total, first.signals.len()), (26, 20));
    assert_eq!(first.signals[0].title(), "gh-0");
    let second = store.signals(None, 2, 20);
    assert_eq!(second.signals.len(), 6);
    assert_eq!(second.signals[5].title(), "headline");
    let news = store.signals(Some(SignalSource::News), 1, 20);
    assert_eq!(news.total, 1);
    let beyond = store.signals(None, 9, 20);
    assert!(beyond.signals.is_empty());
    assert_eq!(beyond.total, 26);
}
