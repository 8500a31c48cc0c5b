use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use stockweather_common::{
    AnalysisReport, AnalysisRequest, AnalysisResult, Document, Sentiment, Stage,
};
use stockweather_engine::{
    AnalysisAdapter, Analyzer, ClaudeClient, EntityResolver, Orchestrator, ProgressSink,
    ProviderClient, RetrievalAggregator,
};

// --- Test doubles ---

#[derive(Debug)]
enum Recorded {
    Progress(Stage),
    Done(Box<AnalysisReport>),
    Failed(String),
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<Recorded>>,
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn publish_progress(
        &self,
        _connection_id: &str,
        stage: Stage,
        _message: &str,
        _query: &str,
    ) {
        self.events.lock().unwrap().push(Recorded::Progress(stage));
    }

    async fn publish_final(
        &self,
        _connection_id: &str,
        _query: &str,
        outcome: Result<AnalysisReport, String>,
    ) {
        let event = match outcome {
            Ok(report) => Recorded::Done(Box::new(report)),
            Err(message) => Recorded::Failed(message),
        };
        self.events.lock().unwrap().push(event);
    }
}

struct FixedAnalyzer;

#[async_trait]
impl Analyzer for FixedAnalyzer {
    async fn analyze(&self, entity_name: &str, documents: &[Document]) -> AnalysisResult {
        AnalysisResult::neutral_fallback(format!(
            "analyzed {entity_name} over {} documents",
            documents.len()
        ))
    }
}

struct OneDocProvider;

#[async_trait]
impl ProviderClient for OneDocProvider {
    fn id(&self) -> &'static str {
        "one_doc"
    }

    async fn fetch(&self, term: &str, _limit: usize) -> Result<Vec<Document>> {
        Ok(vec![Document {
            title: format!("article about {term}"),
            description: "desc".to_string(),
            link: format!("https://news.example/{term}"),
            published_at: Some(Utc::now()),
            thumbnail: None,
            provider_id: "one_doc",
        }])
    }
}

struct FailingProvider;

#[async_trait]
impl ProviderClient for FailingProvider {
    fn id(&self) -> &'static str {
        "failing"
    }

    async fn fetch(&self, _term: &str, _limit: usize) -> Result<Vec<Document>> {
        Err(anyhow!("simulated outage"))
    }
}

fn request(query: &str) -> AnalysisRequest {
    AnalysisRequest {
        query: query.to_string(),
        connection_id: "conn-1".to_string(),
        selected_entity_code: None,
    }
}

fn orchestrator(
    providers: Vec<Arc<dyn ProviderClient>>,
    analyzer: Arc<dyn Analyzer>,
    sink: Arc<RecordingSink>,
) -> Orchestrator {
    Orchestrator::new(
        Arc::new(EntityResolver::new()),
        RetrievalAggregator::new(providers),
        analyzer,
        sink,
    )
}

// --- Tests ---

#[tokio::test]
async fn stages_emitted_in_pipeline_order_with_single_terminal() {
    let sink = Arc::new(RecordingSink::default());
    let orch = orchestrator(
        vec![Arc::new(OneDocProvider)],
        Arc::new(FixedAnalyzer),
        Arc::clone(&sink),
    );

    orch.run(request("samsung")).await;

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 4);
    assert!(matches!(events[0], Recorded::Progress(Stage::Resolving)));
    assert!(matches!(events[1], Recorded::Progress(Stage::Retrieving)));
    assert!(matches!(events[2], Recorded::Progress(Stage::Analyzing)));
    assert!(matches!(events[3], Recorded::Done(_)));
}

#[tokio::test]
async fn report_carries_entity_articles_and_disclaimer() {
    let sink = Arc::new(RecordingSink::default());
    let orch = orchestrator(
        vec![Arc::new(OneDocProvider)],
        Arc::new(FixedAnalyzer),
        Arc::clone(&sink),
    );

    orch.run(request("삼전")).await;

    let events = sink.events.lock().unwrap();
    let Recorded::Done(report) = events.last().unwrap() else {
        panic!("expected a DONE terminal event");
    };
    assert_eq!(report.entity_name, "Samsung Electronics");
    assert!(!report.articles.is_empty());
    assert!(!report.disclaimer.is_empty());
}

#[tokio::test]
async fn total_upstream_failure_still_ends_in_done_with_neutral_default() {
    // Every provider fails and the AI endpoint is unroutable: the
    // pipeline did not malfunction, so the terminal event is DONE with
    // the canonical neutral result, not FAILED.
    let sink = Arc::new(RecordingSink::default());
    let adapter = AnalysisAdapter::new(
        ClaudeClient::new("test-key").with_base_url("http://127.0.0.1:1"),
    );
    let orch = orchestrator(
        vec![Arc::new(FailingProvider)],
        Arc::new(adapter),
        Arc::clone(&sink),
    );

    orch.run(request("samsung")).await;

    let events = sink.events.lock().unwrap();
    let Recorded::Done(report) = events.last().unwrap() else {
        panic!("expected a DONE terminal event");
    };
    assert_eq!(report.result.overall_sentiment, Sentiment::Neutral);
    assert_eq!(report.result.sentiment_score, 0.5);
    assert!(report.articles.is_empty());
    assert!(report.result.weather_summary.contains("No recent documents"));
}

#[tokio::test]
async fn invalid_request_ends_in_failed_with_message() {
    let sink = Arc::new(RecordingSink::default());
    let orch = orchestrator(
        vec![Arc::new(OneDocProvider)],
        Arc::new(FixedAnalyzer),
        Arc::clone(&sink),
    );

    orch.run(request("   ")).await;

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1, "exactly one terminal event, nothing else");
    let Recorded::Failed(message) = &events[0] else {
        panic!("expected a FAILED terminal event");
    };
    assert!(message.contains("query"));
}

#[tokio::test]
async fn selected_entity_code_wins_over_query_text() {
    let sink = Arc::new(RecordingSink::default());
    let orch = orchestrator(
        vec![Arc::new(OneDocProvider)],
        Arc::new(FixedAnalyzer),
        Arc::clone(&sink),
    );

    let mut req = request("naver");
    req.selected_entity_code = Some("00126380".to_string());
    orch.run(req).await;

    let events = sink.events.lock().unwrap();
    let Recorded::Done(report) = events.last().unwrap() else {
        panic!("expected a DONE terminal event");
    };
    assert_eq!(report.entity_name, "Samsung Electronics");
}

#[tokio::test]
async fn unknown_entity_code_falls_back_to_query() {
    let sink = Arc::new(RecordingSink::default());
    let orch = orchestrator(
        vec![Arc::new(OneDocProvider)],
        Arc::new(FixedAnalyzer),
        Arc::clone(&sink),
    );

    let mut req = request("kakao");
    req.selected_entity_code = Some("99999999".to_string());
    orch.run(req).await;

    let events = sink.events.lock().unwrap();
    let Recorded::Done(report) = events.last().unwrap() else {
        panic!("expected a DONE terminal event");
    };
    assert_eq!(report.entity_name, "Kakao");
}
