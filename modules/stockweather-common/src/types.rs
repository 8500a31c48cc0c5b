use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Disclaimer attached to every analysis report pushed to a client.
pub const DISCLAIMER: &str = "This analysis is an AI-generated estimate and is \
unrelated to actual investment outcomes. Investment decisions are your own \
responsibility.";

// --- Retrieval ---

/// A canonical entity plus the expanded terms used to query providers.
/// Mappings are loaded once at process start and shared read-only; the
/// optional corp code addresses the disclosure registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMapping {
    pub canonical_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corp_code: Option<String>,
    pub search_terms: Vec<String>,
}

/// A normalized document from one retrieval provider. Lives only inside a
/// single pipeline run; the dedup key is `link`.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub title: String,
    pub description: String,
    pub link: String,
    /// Publication time if the provider reported one. Never fabricated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub provider_id: &'static str,
}

// --- Analysis enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    VeryNegative,
    Unknown,
}

impl Sentiment {
    /// Parse a wire value. Anything outside the declared set is `None`;
    /// callers substitute a default instead of failing.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "VERY_POSITIVE" => Some(Self::VeryPositive),
            "POSITIVE" => Some(Self::Positive),
            "NEUTRAL" => Some(Self::Neutral),
            "NEGATIVE" => Some(Self::Negative),
            "VERY_NEGATIVE" => Some(Self::VeryNegative),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Opinion {
    Buy,
    Accumulate,
    Hold,
    Reduce,
    Sell,
}

impl Opinion {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BUY" => Some(Self::Buy),
            "ACCUMULATE" => Some(Self::Accumulate),
            "HOLD" => Some(Self::Hold),
            "REDUCE" => Some(Self::Reduce),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// The weather metaphor shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    Sunny,
    PartlyCloudy,
    Cloudy,
    Rainy,
    Stormy,
}

impl WeatherIcon {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sunny" => Some(Self::Sunny),
            "partly_cloudy" => Some(Self::PartlyCloudy),
            "cloudy" => Some(Self::Cloudy),
            "rainy" => Some(Self::Rainy),
            "stormy" => Some(Self::Stormy),
            _ => None,
        }
    }

    /// Icon implied by an overall sentiment, used when the AI response
    /// carries no usable icon of its own.
    pub fn for_sentiment(sentiment: Sentiment) -> Self {
        match sentiment {
            Sentiment::VeryPositive => Self::Sunny,
            Sentiment::Positive => Self::PartlyCloudy,
            Sentiment::Neutral | Sentiment::Unknown => Self::Cloudy,
            Sentiment::Negative => Self::Rainy,
            Sentiment::VeryNegative => Self::Stormy,
        }
    }
}

// --- Analysis result ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeywordSentiment {
    pub text: String,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentOpinion {
    pub opinion: Opinion,
    /// How sure the AI is of the opinion, 0.0 to 1.0.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEntity {
    pub name: String,
    pub opinion: Opinion,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

/// Free-text breakdown behind the headline sentiment. Each field is
/// repaired independently when the AI response is malformed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysis {
    pub positives: String,
    pub negatives: String,
    pub outlook: String,
}

impl DetailedAnalysis {
    pub const PLACEHOLDER: &'static str = "No analysis available.";

    pub fn placeholder() -> Self {
        Self {
            positives: Self::PLACEHOLDER.to_string(),
            negatives: Self::PLACEHOLDER.to_string(),
            outlook: Self::PLACEHOLDER.to_string(),
        }
    }
}

/// The structured verdict for one entity. Invariant: every enum field
/// holds a declared value; the analysis adapter enforces this by
/// substitution, never by rejecting the response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub weather_summary: String,
    pub overall_sentiment: Sentiment,
    /// 0.0 (worst) to 1.0 (best).
    pub sentiment_score: f64,
    pub keywords: Vec<KeywordSentiment>,
    pub report_summary: String,
    pub detailed_analysis: DetailedAnalysis,
    pub investment_opinion: InvestmentOpinion,
    pub related_entities: Vec<RelatedEntity>,
    pub weather_icon: WeatherIcon,
}

impl AnalysisResult {
    /// The canonical neutral result, used both when there is nothing to
    /// analyze and when the AI service is unreachable. `explanation`
    /// tells the client *why* the result is neutral.
    pub fn neutral_fallback(explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        Self {
            weather_summary: explanation.clone(),
            overall_sentiment: Sentiment::Neutral,
            sentiment_score: 0.5,
            keywords: Vec::new(),
            report_summary: explanation,
            detailed_analysis: DetailedAnalysis::placeholder(),
            investment_opinion: InvestmentOpinion {
                opinion: Opinion::Hold,
                confidence: 0.0,
                reason: None,
            },
            related_entities: Vec::new(),
            weather_icon: WeatherIcon::Cloudy,
        }
    }
}

// --- Final report ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub title: String,
    pub description: String,
    pub link: String,
}

/// What the client actually receives on `DONE`: the analysis plus the
/// leading articles it was grounded on, stamped and disclaimed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub entity_name: String,
    pub result: AnalysisResult,
    pub articles: Vec<ArticleSummary>,
    pub timestamp: DateTime<Utc>,
    pub disclaimer: String,
}

// --- Requests and progress ---

/// One client-initiated analysis. Owned by a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub query: String,
    pub connection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_entity_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Resolving,
    Retrieving,
    Analyzing,
    Done,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Resolving => write!(f, "RESOLVING"),
            Stage::Retrieving => write!(f, "RETRIEVING"),
            Stage::Analyzing => write!(f, "ANALYZING"),
            Stage::Done => write!(f, "DONE"),
            Stage::Failed => write!(f, "FAILED"),
        }
    }
}

/// What travels from the engine process to the connection holder.
/// Fire-and-forget: never persisted, never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RelayEvent {
    Progress {
        stage: Stage,
        message: String,
        query: String,
    },
    Done {
        report: AnalysisReport,
    },
    Failed {
        message: String,
        query: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEnvelope {
    pub connection_id: String,
    #[serde(flatten)]
    pub event: RelayEvent,
}
