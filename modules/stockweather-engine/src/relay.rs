use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use stockweather_common::{AnalysisReport, RelayEnvelope, RelayEvent, Stage};

/// Progress pushes are perishable; don't hold the pipeline hostage.
const RELAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivery target for stage progress and the terminal event of a run.
/// At-most-once, best-effort: implementations log delivery failures and
/// drop the event. No retry, no queue.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish_progress(
        &self,
        connection_id: &str,
        stage: Stage,
        message: &str,
        query: &str,
    );

    async fn publish_final(
        &self,
        connection_id: &str,
        query: &str,
        outcome: Result<AnalysisReport, String>,
    );
}

/// Pushes events to the connection-holding process over HTTP. The caller
/// and the holder of the live client connection are not assumed to be
/// the same process; `connection_id` is the only address.
pub struct HttpProgressRelay {
    http: reqwest::Client,
    base_url: String,
}

impl HttpProgressRelay {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(RELAY_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn push(&self, envelope: &RelayEnvelope) -> anyhow::Result<()> {
        let response = self
            .http
            .post(format!("{}/relay", self.base_url))
            .json(envelope)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("relay endpoint returned {}", response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressSink for HttpProgressRelay {
    async fn publish_progress(
        &self,
        connection_id: &str,
        stage: Stage,
        message: &str,
        query: &str,
    ) {
        let envelope = RelayEnvelope {
            connection_id: connection_id.to_string(),
            event: RelayEvent::Progress {
                stage,
                message: message.to_string(),
                query: query.to_string(),
            },
        };

        match self.push(&envelope).await {
            Ok(()) => debug!(connection_id, %stage, "Progress delivered"),
            // A reconnecting client simply won't see stale progress.
            Err(e) => warn!(connection_id, %stage, error = %e, "Progress delivery failed, dropping"),
        }
    }

    async fn publish_final(
        &self,
        connection_id: &str,
        query: &str,
        outcome: Result<AnalysisReport, String>,
    ) {
        let envelope = RelayEnvelope {
            connection_id: connection_id.to_string(),
            event: match outcome {
                Ok(report) => RelayEvent::Done { report },
                Err(message) => RelayEvent::Failed {
                    message,
                    query: query.to_string(),
                },
            },
        };

        match self.push(&envelope).await {
            Ok(()) => debug!(connection_id, "Final event delivered"),
            // The pipeline's work is done either way; record the loss.
            Err(e) => error!(connection_id, error = %e, "Final event delivery failed, result lost"),
        }
    }
}
