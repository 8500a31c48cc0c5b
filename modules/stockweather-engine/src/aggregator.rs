use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use stockweather_common::{Document, EntityMapping};

use crate::providers::ProviderClient;

/// Fetch one (provider, term) pair. Kept as a free async fn so the
/// fan-out stream holds a concrete future type; an inline `async move`
/// closure over `Arc<dyn ProviderClient>` trips the compiler's
/// higher-ranked lifetime inference.
async fn fetch_pair(
    provider: Arc<dyn ProviderClient>,
    term: String,
    per_provider_limit: usize,
) -> (&'static str, String, Result<Vec<Document>>) {
    let outcome = provider.fetch(&term, per_provider_limit).await;
    (provider.id(), term, outcome)
}

/// Max in-flight provider calls. The stream is order-preserving, so
/// "first seen" during dedup is deterministic in (provider, term) order.
const FAN_OUT_CONCURRENCY: usize = 5;

/// Fans one entity's search terms out across every configured provider
/// and folds the results into a single best-effort corpus. One failing
/// (provider, term) pair never affects its siblings; the corpus may
/// legitimately come back empty.
pub struct RetrievalAggregator {
    providers: Vec<Arc<dyn ProviderClient>>,
}

impl RetrievalAggregator {
    pub fn new(providers: Vec<Arc<dyn ProviderClient>>) -> Self {
        Self { providers }
    }

    pub async fn aggregate(
        &self,
        mapping: &EntityMapping,
        per_provider_limit: usize,
        total_limit: usize,
    ) -> Vec<Document> {
        let pairs: Vec<(Arc<dyn ProviderClient>, String)> = self
            .providers
            .iter()
            .flat_map(|provider| {
                mapping
                    .search_terms
                    .iter()
                    .map(move |term| (Arc::clone(provider), term.clone()))
            })
            .collect();

        info!(
            entity = mapping.canonical_name.as_str(),
            pairs = pairs.len(),
            "Starting retrieval fan-out"
        );

        // Settle all pairs; a rejection is logged and discarded.
        let mut pair_futures = Vec::with_capacity(pairs.len());
        for (provider, term) in pairs {
            pair_futures.push(fetch_pair(provider, term, per_provider_limit));
        }
        let results: Vec<_> = stream::iter(pair_futures)
            .buffered(FAN_OUT_CONCURRENCY)
            .collect()
            .await;

        let mut seen: HashSet<String> = HashSet::new();
        let mut documents: Vec<Document> = Vec::new();
        for (provider_id, term, outcome) in results {
            match outcome {
                Ok(docs) => {
                    for doc in docs {
                        // First-seen entry wins for any given link.
                        if seen.insert(doc.link.clone()) {
                            documents.push(doc);
                        }
                    }
                }
                Err(e) => {
                    warn!(provider = provider_id, term = term.as_str(), error = %e, "Provider fetch failed");
                }
            }
        }

        // Newest first. `None` orders below every `Some`, so undated
        // documents sort as least-recent without being dropped; the sort
        // is stable, so ties keep first-seen order.
        documents.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        documents.truncate(total_limit);

        info!(
            entity = mapping.canonical_name.as_str(),
            count = documents.len(),
            "Retrieval complete"
        );
        documents
    }
}
