use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use stockweather_common::{Config, Document};

use crate::resolver::EntityResolver;

/// Per-call timeout for document providers. A timed-out call counts as a
/// failed call; it never cancels sibling fetches.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Disclosure lookback window, matching the registry's usual reporting
/// cadence.
const DISCLOSURE_WINDOW_DAYS: i64 = 90;

// --- ProviderClient trait ---

/// One external document source. Implementations absorb ordinary
/// provider-side failures (HTTP errors, rate limits, malformed payloads)
/// by logging and returning an empty list; `Err` is reserved for
/// conditions the caller should at least see, and the aggregator absorbs
/// those too.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn id(&self) -> &'static str;
    async fn fetch(&self, term: &str, limit: usize) -> Result<Vec<Document>>;
}

/// Build the provider set from configuration. A provider with missing
/// credentials is reported once here and left out of the fan-out,
/// never re-checked per call.
pub fn providers_from_config(
    config: &Config,
    resolver: Arc<EntityResolver>,
) -> Vec<Arc<dyn ProviderClient>> {
    let mut providers: Vec<Arc<dyn ProviderClient>> = Vec::new();

    if config.has_naver_credentials() {
        providers.push(Arc::new(NaverNewsClient::new(
            &config.naver_client_id,
            &config.naver_client_secret,
        )));
    } else {
        warn!("NAVER_CLIENT_ID/NAVER_CLIENT_SECRET not set, skipping Naver news provider");
    }

    if config.has_google_credentials() {
        providers.push(Arc::new(GoogleCseClient::new(
            &config.google_cse_api_key,
            &config.google_cse_id,
        )));
    } else {
        warn!("GOOGLE_CSE_API_KEY/GOOGLE_CSE_ID not set, skipping Google news provider");
    }

    if config.has_dart_credentials() {
        providers.push(Arc::new(DartDisclosureClient::new(
            &config.dart_api_key,
            resolver,
        )));
    } else {
        warn!("DART_OPENAPI_KEY not set, skipping disclosure provider");
    }

    info!(count = providers.len(), "Document providers configured");
    providers
}

/// Strip markup from provider text fields. Providers highlight query
/// terms with inline tags; only the text survives into a Document.
fn strip_html(text: &str) -> String {
    let tag_re = regex::Regex::new(r"<[^>]*>").expect("valid regex");
    tag_re.replace_all(text, "").into_owned()
}

// --- Naver news search ---

pub struct NaverNewsClient {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct NaverNewsResponse {
    #[serde(default)]
    items: Vec<NaverNewsItem>,
}

#[derive(Debug, serde::Deserialize)]
struct NaverNewsItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    originallink: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "pubDate")]
    pub_date: String,
}

impl NaverNewsClient {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            http: reqwest::Client::builder()
                .timeout(PROVIDER_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

fn map_naver_items(items: Vec<NaverNewsItem>) -> Vec<Document> {
    items
        .into_iter()
        .filter_map(|item| {
            // The article's own URL when present, the portal URL otherwise.
            let link = if item.originallink.is_empty() {
                item.link
            } else {
                item.originallink
            };
            if link.is_empty() {
                return None;
            }
            Some(Document {
                title: strip_html(&item.title),
                description: strip_html(&item.description),
                link,
                published_at: DateTime::parse_from_rfc2822(&item.pub_date)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
                thumbnail: None,
                provider_id: "naver_news",
            })
        })
        .collect()
}

#[async_trait]
impl ProviderClient for NaverNewsClient {
    fn id(&self) -> &'static str {
        "naver_news"
    }

    async fn fetch(&self, term: &str, limit: usize) -> Result<Vec<Document>> {
        debug!(term, limit, provider = self.id(), "Fetching documents");

        let display = limit.to_string();
        let response = match self
            .http
            .get("https://openapi.naver.com/v1/search/news.json")
            .header("X-Naver-Client-Id", &self.client_id)
            .header("X-Naver-Client-Secret", &self.client_secret)
            .query(&[
                ("query", term),
                ("display", display.as_str()),
                ("sort", "date"),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(term, provider = self.id(), error = %e, "Request failed");
                return Ok(Vec::new());
            }
        };

        if !response.status().is_success() {
            warn!(
                term,
                provider = self.id(),
                status = %response.status(),
                "Provider returned error status"
            );
            return Ok(Vec::new());
        }

        let data: NaverNewsResponse = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                warn!(term, provider = self.id(), error = %e, "Malformed payload");
                return Ok(Vec::new());
            }
        };

        let documents = map_naver_items(data.items);
        info!(term, provider = self.id(), count = documents.len(), "Fetched documents");
        Ok(documents)
    }
}

// --- Google Custom Search ---

pub struct GoogleCseClient {
    api_key: String,
    cse_id: String,
    http: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct GoogleSearchResponse {
    #[serde(default)]
    items: Vec<GoogleSearchItem>,
}

#[derive(Debug, serde::Deserialize)]
struct GoogleSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    pagemap: Option<GooglePagemap>,
}

#[derive(Debug, serde::Deserialize)]
struct GooglePagemap {
    #[serde(default)]
    cse_thumbnail: Vec<GoogleThumbnail>,
}

#[derive(Debug, serde::Deserialize)]
struct GoogleThumbnail {
    #[serde(default)]
    src: String,
}

impl GoogleCseClient {
    pub fn new(api_key: &str, cse_id: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            cse_id: cse_id.to_string(),
            http: reqwest::Client::builder()
                .timeout(PROVIDER_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

fn map_google_items(items: Vec<GoogleSearchItem>) -> Vec<Document> {
    items
        .into_iter()
        .filter_map(|item| {
            if item.link.is_empty() {
                return None;
            }
            let thumbnail = item
                .pagemap
                .and_then(|p| p.cse_thumbnail.into_iter().next())
                .map(|t| t.src)
                .filter(|src| !src.is_empty());
            Some(Document {
                title: strip_html(&item.title),
                description: strip_html(&item.snippet),
                link: item.link,
                // The search API reports no publication time; leave it
                // unset rather than inventing one.
                published_at: None,
                thumbnail,
                provider_id: "google_cse",
            })
        })
        .collect()
}

#[async_trait]
impl ProviderClient for GoogleCseClient {
    fn id(&self) -> &'static str {
        "google_cse"
    }

    async fn fetch(&self, term: &str, limit: usize) -> Result<Vec<Document>> {
        debug!(term, limit, provider = self.id(), "Fetching documents");

        // The API caps num at 10 per request.
        let num = limit.min(10).to_string();

        let response = match self
            .http
            .get("https://www.googleapis.com/customsearch/v1")
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", term),
                ("num", num.as_str()),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(term, provider = self.id(), error = %e, "Request failed");
                return Ok(Vec::new());
            }
        };

        if !response.status().is_success() {
            warn!(
                term,
                provider = self.id(),
                status = %response.status(),
                "Provider returned error status"
            );
            return Ok(Vec::new());
        }

        let data: GoogleSearchResponse = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                warn!(term, provider = self.id(), error = %e, "Malformed payload");
                return Ok(Vec::new());
            }
        };

        let documents = map_google_items(data.items);
        info!(term, provider = self.id(), count = documents.len(), "Fetched documents");
        Ok(documents)
    }
}

// --- DART disclosure registry ---

pub struct DartDisclosureClient {
    api_key: String,
    resolver: Arc<EntityResolver>,
    http: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct DartListResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    list: Vec<DartListItem>,
}

#[derive(Debug, serde::Deserialize)]
struct DartListItem {
    #[serde(default)]
    rcept_no: String,
    #[serde(default)]
    corp_name: String,
    #[serde(default)]
    report_nm: String,
    #[serde(default)]
    flr_nm: String,
    #[serde(default)]
    rcept_dt: String,
}

impl DartDisclosureClient {
    pub fn new(api_key: &str, resolver: Arc<EntityResolver>) -> Self {
        Self {
            api_key: api_key.to_string(),
            resolver,
            http: reqwest::Client::builder()
                .timeout(PROVIDER_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

fn map_dart_items(items: Vec<DartListItem>, limit: usize) -> Vec<Document> {
    let mut documents: Vec<Document> = items
        .into_iter()
        .filter_map(|item| {
            if item.rcept_no.is_empty() {
                return None;
            }
            Some(Document {
                title: item.report_nm,
                description: format!("{} (filed by {})", item.corp_name, item.flr_nm),
                link: format!(
                    "https://dart.fss.or.kr/dsaf001/main.do?rcpNo={}",
                    item.rcept_no
                ),
                published_at: chrono::NaiveDate::parse_from_str(&item.rcept_dt, "%Y%m%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc()),
                thumbnail: None,
                provider_id: "dart_disclosure",
            })
        })
        .collect();

    // Receipt date descending, newest disclosures first.
    documents.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    documents.truncate(limit);
    documents
}

#[async_trait]
impl ProviderClient for DartDisclosureClient {
    fn id(&self) -> &'static str {
        "dart_disclosure"
    }

    async fn fetch(&self, term: &str, limit: usize) -> Result<Vec<Document>> {
        // The registry is addressed by corp code, not free text. Terms
        // outside the mapping table have nothing to fetch.
        let Some(corp_code) = self.resolver.corp_code_for_term(term) else {
            debug!(term, provider = self.id(), "No corp code for term, skipping");
            return Ok(Vec::new());
        };

        let end = Utc::now().date_naive();
        let begin = end - chrono::Duration::days(DISCLOSURE_WINDOW_DAYS);
        let bgn_de = begin.format("%Y%m%d").to_string();
        let end_de = end.format("%Y%m%d").to_string();

        debug!(term, corp_code = corp_code.as_str(), provider = self.id(), "Fetching disclosures");

        let response = match self
            .http
            .get("https://opendart.fss.or.kr/api/list.json")
            .query(&[
                ("crtfc_key", self.api_key.as_str()),
                ("corp_code", corp_code.as_str()),
                ("bgn_de", bgn_de.as_str()),
                ("end_de", end_de.as_str()),
                ("page_no", "1"),
                ("page_set", "100"),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(term, provider = self.id(), error = %e, "Request failed");
                return Ok(Vec::new());
            }
        };

        if !response.status().is_success() {
            warn!(
                term,
                provider = self.id(),
                status = %response.status(),
                "Provider returned error status"
            );
            return Ok(Vec::new());
        }

        let data: DartListResponse = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                warn!(term, provider = self.id(), error = %e, "Malformed payload");
                return Ok(Vec::new());
            }
        };

        // "013" is the registry's empty-result status, not an error.
        if data.status != "000" {
            if data.status == "013" {
                debug!(term, provider = self.id(), "No disclosures in window");
            } else {
                warn!(
                    term,
                    provider = self.id(),
                    status = data.status.as_str(),
                    message = data.message.as_str(),
                    "Registry returned error status"
                );
            }
            return Ok(Vec::new());
        }

        let documents = map_dart_items(data.list, limit);
        info!(term, provider = self.id(), count = documents.len(), "Fetched disclosures");
        Ok(documents)
    }
}
