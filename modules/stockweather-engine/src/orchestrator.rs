use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info};

use stockweather_common::{
    AnalysisReport, AnalysisRequest, ArticleSummary, Config, EntityMapping, Stage,
    StockweatherError, DISCLAIMER,
};

use crate::aggregator::RetrievalAggregator;
use crate::analysis::{AnalysisAdapter, Analyzer};
use crate::claude::ClaudeClient;
use crate::providers::providers_from_config;
use crate::relay::{HttpProgressRelay, ProgressSink};
use crate::resolver::EntityResolver;

/// Documents requested from each (provider, term) pair.
const PER_PROVIDER_LIMIT: usize = 20;
/// Corpus cap handed to the analysis stage.
const TOTAL_LIMIT: usize = 20;
/// Leading articles echoed back in the final report.
const REPORT_ARTICLE_COUNT: usize = 10;

/// The pipeline state machine: RESOLVING → RETRIEVING → ANALYZING →
/// DONE | FAILED. Provider and AI failures are absorbed by the stages
/// themselves; only an error escaping those guards reaches FAILED.
pub struct Orchestrator {
    resolver: Arc<EntityResolver>,
    aggregator: RetrievalAggregator,
    analyzer: Arc<dyn Analyzer>,
    sink: Arc<dyn ProgressSink>,
}

impl Orchestrator {
    pub fn new(
        resolver: Arc<EntityResolver>,
        aggregator: RetrievalAggregator,
        analyzer: Arc<dyn Analyzer>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            resolver,
            aggregator,
            analyzer,
            sink,
        }
    }

    /// Wire the production pipeline from configuration.
    pub fn from_config(config: &Config) -> Self {
        let resolver = Arc::new(EntityResolver::new());
        let providers = providers_from_config(config, Arc::clone(&resolver));
        Self::new(
            resolver,
            RetrievalAggregator::new(providers),
            Arc::new(AnalysisAdapter::new(ClaudeClient::new(
                &config.anthropic_api_key,
            ))),
            Arc::new(HttpProgressRelay::new(&config.relay_base_url)),
        )
    }

    /// Drive one request to exactly one terminal event. The terminal
    /// publish lives only here, in the single match around `run_inner`,
    /// so no outcome can emit zero or two of them.
    pub async fn run(&self, request: AnalysisRequest) {
        info!(
            query = request.query.as_str(),
            connection_id = request.connection_id.as_str(),
            "Analysis run started"
        );

        match self.run_inner(&request).await {
            Ok(report) => {
                info!(
                    query = request.query.as_str(),
                    entity = report.entity_name.as_str(),
                    "Analysis run complete"
                );
                self.sink
                    .publish_final(&request.connection_id, &request.query, Ok(report))
                    .await;
            }
            Err(e) => {
                error!(query = request.query.as_str(), error = %e, "Analysis run failed");
                self.sink
                    .publish_final(&request.connection_id, &request.query, Err(e.to_string()))
                    .await;
            }
        }
    }

    async fn run_inner(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        if request.query.trim().is_empty() {
            return Err(
                StockweatherError::Validation("query must not be empty".to_string()).into(),
            );
        }

        self.sink
            .publish_progress(
                &request.connection_id,
                Stage::Resolving,
                "Resolving entity",
                &request.query,
            )
            .await;
        let mapping = self.resolve(request);

        self.sink
            .publish_progress(
                &request.connection_id,
                Stage::Retrieving,
                &format!("Collecting recent documents for {}", mapping.canonical_name),
                &request.query,
            )
            .await;
        let documents = self
            .aggregator
            .aggregate(&mapping, PER_PROVIDER_LIMIT, TOTAL_LIMIT)
            .await;

        self.sink
            .publish_progress(
                &request.connection_id,
                Stage::Analyzing,
                &format!("Analyzing {} documents", documents.len()),
                &request.query,
            )
            .await;
        let result = self
            .analyzer
            .analyze(&mapping.canonical_name, &documents)
            .await;

        let articles = documents
            .iter()
            .take(REPORT_ARTICLE_COUNT)
            .map(|doc| ArticleSummary {
                title: doc.title.clone(),
                description: doc.description.clone(),
                link: doc.link.clone(),
            })
            .collect();

        Ok(AnalysisReport {
            entity_name: mapping.canonical_name,
            result,
            articles,
            timestamp: Utc::now(),
            disclaimer: DISCLAIMER.to_string(),
        })
    }

    /// A client-picked entity code wins over free-text resolution; an
    /// unknown code falls back to the query text.
    fn resolve(&self, request: &AnalysisRequest) -> EntityMapping {
        if let Some(code) = &request.selected_entity_code {
            if let Some(mapping) = self.resolver.resolve_by_code(code) {
                return mapping;
            }
            debug!(code = code.as_str(), "Unknown entity code, falling back to query resolution");
        }
        self.resolver.resolve(&request.query)
    }
}
