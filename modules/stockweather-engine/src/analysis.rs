use async_trait::async_trait;
use schemars::schema_for;
use serde_json::Value;
use tracing::{info, warn};

use stockweather_common::{
    AnalysisResult, DetailedAnalysis, Document, InvestmentOpinion, KeywordSentiment, Opinion,
    RelatedEntity, Sentiment, WeatherIcon,
};

use crate::claude::{strip_code_blocks, ClaudeClient};

/// Serialized corpus cap, below the model's input limit with headroom.
const MAX_PROMPT_BYTES: usize = 30_000;

const ANALYSIS_INSTRUCTIONS: &str = r#"You are an equity sentiment analyst. You receive one company name and a set of recent documents about it (news articles and regulatory disclosures). Weigh the documents against each other (recency and concreteness beat volume) and produce a single overall verdict.

Rules:
- Ground every claim in the provided documents. If they are thin or contradictory, say so and lower your confidence.
- overallSentiment expresses the document tone; sentimentScore maps it to 0.0 (worst) through 1.0 (best).
- investmentOpinion is your positioning call with a confidence between 0.0 and 1.0 and a one-sentence reason.
- keywords are the handful of recurring themes, each tagged with its own sentiment.
- relatedEntities lists companies materially exposed to the same story, with your opinion for each.
- weatherIcon summarizes the verdict as weather.

Respond with exactly one JSON object conforming to this schema, and nothing else:"#;

// --- Analyzer trait ---

/// The analysis stage. Infallible by contract: upstream failures degrade
/// the result, never the pipeline.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, entity_name: &str, documents: &[Document]) -> AnalysisResult;
}

// --- Claude-backed adapter ---

pub struct AnalysisAdapter {
    claude: ClaudeClient,
    system_prompt: String,
}

impl AnalysisAdapter {
    pub fn new(claude: ClaudeClient) -> Self {
        let schema = schema_for!(AnalysisResult);
        let schema_json =
            serde_json::to_string_pretty(&schema).expect("schema serializes");
        Self {
            claude,
            system_prompt: format!("{ANALYSIS_INSTRUCTIONS}\n\n{schema_json}"),
        }
    }

    fn user_prompt(entity_name: &str, documents: &[Document]) -> String {
        let corpus = serde_json::to_string_pretty(documents)
            .unwrap_or_else(|_| "[]".to_string());

        let mut prompt = format!(
            "Company: {entity_name}\n\nDocuments ({count}):\n{corpus}",
            count = documents.len()
        );

        if prompt.len() > MAX_PROMPT_BYTES {
            let mut end = MAX_PROMPT_BYTES;
            while !prompt.is_char_boundary(end) {
                end -= 1;
            }
            prompt.truncate(end);
        }
        prompt
    }
}

#[async_trait]
impl Analyzer for AnalysisAdapter {
    async fn analyze(&self, entity_name: &str, documents: &[Document]) -> AnalysisResult {
        if documents.is_empty() {
            info!(entity = entity_name, "Empty corpus, returning neutral default");
            return AnalysisResult::neutral_fallback(format!(
                "No recent documents were found for {entity_name}; returning a neutral default analysis."
            ));
        }

        let user_prompt = Self::user_prompt(entity_name, documents);

        let raw = match self.claude.complete(&self.system_prompt, &user_prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(entity = entity_name, error = %e, "Analysis service call failed");
                return AnalysisResult::neutral_fallback(format!(
                    "The analysis service was unavailable for {entity_name}; returning a neutral default analysis."
                ));
            }
        };

        let value: Value = match serde_json::from_str(strip_code_blocks(&raw)) {
            Ok(v) => v,
            Err(e) => {
                warn!(entity = entity_name, error = %e, "Unparseable analysis response");
                return AnalysisResult::neutral_fallback(format!(
                    "The analysis service returned an unreadable response for {entity_name}; returning a neutral default analysis."
                ));
            }
        };

        let result = repair_result(entity_name, &value);
        info!(
            entity = entity_name,
            sentiment = ?result.overall_sentiment,
            opinion = ?result.investment_opinion.opinion,
            "Analysis complete"
        );
        result
    }
}

// --- Schema repair ---

/// Coerce any parsed JSON value into a fully valid AnalysisResult.
/// Every enum field is validated against its declared set and replaced
/// on mismatch; lists that are not lists become empty; the detailed
/// breakdown is rebuilt from whatever partial data exists. A malformed
/// response degrades quality, never availability.
pub fn repair_result(entity_name: &str, value: &Value) -> AnalysisResult {
    let overall_sentiment = value
        .get("overallSentiment")
        .and_then(Value::as_str)
        .and_then(Sentiment::parse)
        .unwrap_or(Sentiment::Neutral);

    let sentiment_score = unit_interval(value.get("sentimentScore"), 0.5);

    let keywords = value
        .get("keywords")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(repair_keyword).collect())
        .unwrap_or_default();

    let investment_opinion = repair_opinion(value.get("investmentOpinion"));

    let related_entities = value
        .get("relatedEntities")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(repair_related).collect())
        .unwrap_or_default();

    let detailed_analysis = repair_detailed(value.get("detailedAnalysis"));

    let weather_summary = non_empty_string(value.get("weatherSummary"))
        .unwrap_or_else(|| format!("Sentiment analysis for {entity_name}."));
    let report_summary = non_empty_string(value.get("reportSummary"))
        .unwrap_or_else(|| "Report summary unavailable.".to_string());

    let weather_icon = value
        .get("weatherIcon")
        .and_then(Value::as_str)
        .and_then(WeatherIcon::parse)
        .unwrap_or_else(|| WeatherIcon::for_sentiment(overall_sentiment));

    AnalysisResult {
        weather_summary,
        overall_sentiment,
        sentiment_score,
        keywords,
        report_summary,
        detailed_analysis,
        investment_opinion,
        related_entities,
        weather_icon,
    }
}

fn repair_keyword(value: &Value) -> Option<KeywordSentiment> {
    let text = non_empty_string(value.get("text"))?;
    let sentiment = value
        .get("sentiment")
        .and_then(Value::as_str)
        .and_then(Sentiment::parse)
        .unwrap_or(Sentiment::Neutral);
    Some(KeywordSentiment { text, sentiment })
}

fn repair_opinion(value: Option<&Value>) -> InvestmentOpinion {
    let get = |key: &str| value.and_then(|v| v.get(key));
    InvestmentOpinion {
        opinion: get("opinion")
            .and_then(Value::as_str)
            .and_then(Opinion::parse)
            .unwrap_or(Opinion::Hold),
        confidence: unit_interval(get("confidence"), 0.0),
        reason: non_empty_string(get("reason")),
    }
}

fn repair_related(value: &Value) -> Option<RelatedEntity> {
    let name = non_empty_string(value.get("name"))?;
    Some(RelatedEntity {
        name,
        opinion: value
            .get("opinion")
            .and_then(Value::as_str)
            .and_then(Opinion::parse)
            .unwrap_or(Opinion::Hold),
        confidence: unit_interval(value.get("confidence"), 0.0),
        relationship: non_empty_string(value.get("relationship")),
    })
}

fn repair_detailed(value: Option<&Value>) -> DetailedAnalysis {
    let field = |key: &str| -> String {
        value
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| DetailedAnalysis::PLACEHOLDER.to_string())
    };
    DetailedAnalysis {
        positives: field("positives"),
        negatives: field("negatives"),
        outlook: field("outlook"),
    }
}

/// A number in [0,1]: numeric values are clamped, numeric strings are
/// parsed then clamped, anything else is the default.
fn unit_interval(value: Option<&Value>, default: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() => n.clamp(0.0, 1.0),
        _ => default,
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repair_invalid_enum_and_confidence_type() {
        // Invalid sentiment and a string confidence; the valid opinion
        // must survive.
        let value = json!({
            "overallSentiment": "bullish",
            "investmentOpinion": { "opinion": "BUY", "confidence": "high" }
        });
        let result = repair_result("Acme Corp", &value);
        assert_eq!(result.overall_sentiment, Sentiment::Neutral);
        assert_eq!(result.investment_opinion.opinion, Opinion::Buy);
        assert_eq!(result.investment_opinion.confidence, 0.0);
    }

    #[test]
    fn test_repair_is_total_over_arbitrary_values() {
        for value in [
            Value::Null,
            json!(42),
            json!("just a string"),
            json!([1, 2, 3]),
            json!({
                "overallSentiment": 7,
                "sentimentScore": "not a number",
                "keywords": "not an array",
                "investmentOpinion": [],
                "relatedEntities": { "oops": true },
                "detailedAnalysis": "flat string",
                "weatherIcon": "tornado"
            }),
        ] {
            let result = repair_result("Acme Corp", &value);
            assert_eq!(result.overall_sentiment, Sentiment::Neutral);
            assert_eq!(result.sentiment_score, 0.5);
            assert!(result.keywords.is_empty());
            assert!(result.related_entities.is_empty());
            assert_eq!(result.investment_opinion.opinion, Opinion::Hold);
            assert_eq!(result.detailed_analysis.positives, DetailedAnalysis::PLACEHOLDER);
            assert_eq!(result.weather_icon, WeatherIcon::Cloudy);
        }
    }

    #[test]
    fn test_repair_keeps_valid_fields() {
        let value = json!({
            "weatherSummary": "Clear skies for Acme.",
            "overallSentiment": "VERY_POSITIVE",
            "sentimentScore": 0.92,
            "keywords": [
                { "text": "earnings beat", "sentiment": "POSITIVE" },
                { "text": "", "sentiment": "POSITIVE" },
                { "sentiment": "NEGATIVE" }
            ],
            "reportSummary": "Strong quarter.",
            "detailedAnalysis": { "positives": "Record margin.", "negatives": "FX headwind." },
            "investmentOpinion": { "opinion": "ACCUMULATE", "confidence": 0.8, "reason": "momentum" },
            "relatedEntities": [
                { "name": "Globex", "opinion": "HOLD", "confidence": 0.4, "relationship": "supplier" }
            ],
            "weatherIcon": "sunny"
        });
        let result = repair_result("Acme Corp", &value);
        assert_eq!(result.overall_sentiment, Sentiment::VeryPositive);
        assert_eq!(result.sentiment_score, 0.92);
        // Keywords without text are dropped, not defaulted into noise.
        assert_eq!(result.keywords.len(), 1);
        assert_eq!(result.keywords[0].text, "earnings beat");
        assert_eq!(result.detailed_analysis.positives, "Record margin.");
        assert_eq!(result.detailed_analysis.outlook, DetailedAnalysis::PLACEHOLDER);
        assert_eq!(result.investment_opinion.opinion, Opinion::Accumulate);
        assert_eq!(result.related_entities[0].relationship.as_deref(), Some("supplier"));
        assert_eq!(result.weather_icon, WeatherIcon::Sunny);
    }

    #[test]
    fn test_score_clamped_and_string_numbers_accepted() {
        let value = json!({ "sentimentScore": 3.5 });
        assert_eq!(repair_result("X", &value).sentiment_score, 1.0);
        let value = json!({ "sentimentScore": "0.25" });
        assert_eq!(repair_result("X", &value).sentiment_score, 0.25);
        let value = json!({ "sentimentScore": -1 });
        assert_eq!(repair_result("X", &value).sentiment_score, 0.0);
    }

    #[test]
    fn test_icon_derived_from_sentiment_when_invalid() {
        let value = json!({ "overallSentiment": "VERY_NEGATIVE", "weatherIcon": "tornado" });
        assert_eq!(repair_result("X", &value).weather_icon, WeatherIcon::Stormy);
    }

    #[tokio::test]
    async fn test_empty_corpus_short_circuits_without_network() {
        // Unroutable base URL: if the adapter ever issued a request the
        // summary would say "unavailable" instead.
        let claude = ClaudeClient::new("test-key").with_base_url("http://127.0.0.1:1");
        let adapter = AnalysisAdapter::new(claude);
        let result = adapter.analyze("Acme Corp", &[]).await;
        assert_eq!(result.overall_sentiment, Sentiment::Neutral);
        assert_eq!(result.sentiment_score, 0.5);
        assert!(result.weather_summary.contains("No recent documents"));
    }
}
