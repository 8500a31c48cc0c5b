use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};

use stockweather_common::{Document, EntityMapping};
use stockweather_engine::{ProviderClient, RetrievalAggregator};

fn doc(link: &str, title: &str, days_ago: Option<i64>) -> Document {
    Document {
        title: title.to_string(),
        description: format!("about {title}"),
        link: link.to_string(),
        published_at: days_ago.map(|d| Utc::now() - Duration::days(d)),
        thumbnail: None,
        provider_id: "test",
    }
}

fn mapping(terms: &[&str]) -> EntityMapping {
    EntityMapping {
        canonical_name: "Acme Corp".to_string(),
        corp_code: None,
        search_terms: terms.iter().map(|t| t.to_string()).collect(),
    }
}

/// Returns the same documents for every term, recording each call.
struct StaticProvider {
    id: &'static str,
    docs: Vec<Document>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StaticProvider {
    fn new(id: &'static str, docs: Vec<Document>) -> Self {
        Self {
            id,
            docs,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ProviderClient for StaticProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn fetch(&self, term: &str, _limit: usize) -> Result<Vec<Document>> {
        self.calls.lock().unwrap().push(term.to_string());
        Ok(self.docs.clone())
    }
}

struct FailingProvider;

#[async_trait]
impl ProviderClient for FailingProvider {
    fn id(&self) -> &'static str {
        "failing"
    }

    async fn fetch(&self, _term: &str, _limit: usize) -> Result<Vec<Document>> {
        Err(anyhow!("simulated provider outage"))
    }
}

#[tokio::test]
async fn duplicate_links_keep_first_seen_entry() {
    let first = StaticProvider::new("a", vec![doc("https://x/1", "first title", Some(1))]);
    let second = StaticProvider::new("b", vec![doc("https://x/1", "second title", Some(2))]);

    let aggregator = RetrievalAggregator::new(vec![Arc::new(first), Arc::new(second)]);
    let docs = aggregator.aggregate(&mapping(&["acme"]), 10, 10).await;

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].title, "first title");
}

#[tokio::test]
async fn output_sorted_newest_first_with_undated_last() {
    let provider = StaticProvider::new(
        "a",
        vec![
            doc("https://x/old", "old", Some(30)),
            doc("https://x/undated", "undated", None),
            doc("https://x/new", "new", Some(1)),
            doc("https://x/mid", "mid", Some(7)),
        ],
    );

    let aggregator = RetrievalAggregator::new(vec![Arc::new(provider)]);
    let docs = aggregator.aggregate(&mapping(&["acme"]), 10, 10).await;

    let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["new", "mid", "old", "undated"]);

    // Non-increasing in published_at, undated never dropped.
    for pair in docs.windows(2) {
        assert!(pair[0].published_at >= pair[1].published_at);
    }
}

#[tokio::test]
async fn failing_providers_do_not_affect_siblings() {
    let healthy = StaticProvider::new("a", vec![doc("https://x/1", "survives", Some(1))]);

    let aggregator = RetrievalAggregator::new(vec![
        Arc::new(FailingProvider),
        Arc::new(healthy),
        Arc::new(FailingProvider),
    ]);
    let docs = aggregator.aggregate(&mapping(&["acme"]), 10, 10).await;

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].title, "survives");
}

#[tokio::test]
async fn all_providers_failing_yields_empty_corpus() {
    let aggregator =
        RetrievalAggregator::new(vec![Arc::new(FailingProvider), Arc::new(FailingProvider)]);
    let docs = aggregator.aggregate(&mapping(&["acme", "acme corp"]), 10, 10).await;
    assert!(docs.is_empty());
}

#[tokio::test]
async fn corpus_truncated_to_total_limit() {
    let provider = StaticProvider::new(
        "a",
        (0..30)
            .map(|i| doc(&format!("https://x/{i}"), &format!("doc {i}"), Some(i)))
            .collect(),
    );

    let aggregator = RetrievalAggregator::new(vec![Arc::new(provider)]);
    let docs = aggregator.aggregate(&mapping(&["acme"]), 50, 5).await;

    assert_eq!(docs.len(), 5);
    // The cap keeps the most recent documents.
    assert_eq!(docs[0].title, "doc 0");
}

#[tokio::test]
async fn fan_out_covers_every_provider_term_pair() {
    let a = StaticProvider::new("a", Vec::new());
    let b = StaticProvider::new("b", Vec::new());
    let a_calls = Arc::clone(&a.calls);
    let b_calls = Arc::clone(&b.calls);

    let aggregator = RetrievalAggregator::new(vec![Arc::new(a), Arc::new(b)]);
    aggregator.aggregate(&mapping(&["acme", "acme corp", "ACME"]), 10, 10).await;

    assert_eq!(a_calls.lock().unwrap().len(), 3);
    assert_eq!(b_calls.lock().unwrap().len(), 3);
}
