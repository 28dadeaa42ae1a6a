use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::job::JobPosting;
use crate::cache::{CacheError, CacheSnapshot, JobCache};
use crate::fetcher::signing::signed_headers;
use crate::filter::filter_non_english;

/// Errors that abort a fetch. The previous cache snapshot is left in place.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Required upstream settings are missing
    #[error("{0} is not configured on the server")]
    Configuration(&'static str),

    /// API key or origin cannot be sent as a header
    #[error("Invalid request header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// Upstream answered with a non-success status
    #[error("External API returned status {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("Request to external API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse external API response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result of a successful `fetch_and_cache` call
#[derive(Debug)]
pub enum FetchOutcome {
    /// The cache now holds `stored` postings
    Updated {
        fetched: usize,
        removed: usize,
        stored: usize,
    },
    /// Upstream had nothing usable; the previous snapshot was kept
    Empty { fetched: usize, removed: usize },
    /// Another fetch was in flight; this is the cache as it stood
    AlreadyRunning(Option<CacheSnapshot>),
}

/// Upstream connection settings
#[derive(Clone, Debug, Default)]
pub struct FetcherSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub allowed_origin: Option<String>,
    /// Whole-request timeout, `Duration::ZERO` for none
    pub timeout: Duration,
}

/// Clears the in-flight flag however the fetch ends
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Pulls postings from the external jobs API into the job cache.
///
/// At most one fetch runs at a time per instance. Share one instance
/// between the scheduler and the HTTP handlers.
pub struct JobFetcher {
    settings: FetcherSettings,
    client: reqwest::Client,
    cache: Arc<JobCache>,
    in_flight: AtomicBool,
}

impl JobFetcher {
    pub fn new(settings: FetcherSettings, cache: Arc<JobCache>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        // Zero means no overall request timeout
        if !settings.timeout.is_zero() {
            builder = builder.timeout(settings.timeout);
        }
        let client = builder.build().map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            settings,
            client,
            cache,
            in_flight: AtomicBool::new(false),
        })
    }

    pub fn cache(&self) -> &Arc<JobCache> {
        &self.cache
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Fetch fresh postings, drop non-English ones and replace the cache.
    ///
    /// # Returns
    /// - `Ok(FetchOutcome::AlreadyRunning)` - another fetch holds the flag, no request was made
    /// - `Ok(FetchOutcome::Empty)` - nothing to store, cache untouched
    /// - `Ok(FetchOutcome::Updated)` - cache replaced
    /// - `Err(FetchError)` - fetch aborted, cache untouched
    pub async fn fetch_and_cache(&self) -> Result<FetchOutcome, FetchError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            info!("Fetch already in progress, returning cached jobs");
            return Ok(FetchOutcome::AlreadyRunning(self.cache.read().await));
        };

        let result = self.fetch_into_cache().await;
        if let Err(e) = &result {
            error!("Error fetching jobs from external API: {}", e);
        }
        result
    }

    async fn fetch_into_cache(&self) -> Result<FetchOutcome, FetchError> {
        let postings = self.fetch_postings().await?;
        let fetched = postings.len();

        let (postings, removed) = filter_non_english(postings);

        if postings.is_empty() {
            info!(
                "No jobs returned from fetch ({} received, {} filtered), keeping current cache",
                fetched, removed
            );
            return Ok(FetchOutcome::Empty { fetched, removed });
        }

        let snapshot = self.cache.write(postings).await?;
        info!("Fetched {} fresh jobs at {}", snapshot.jobs.len(), snapshot.fetched_at);

        Ok(FetchOutcome::Updated {
            fetched,
            removed,
            stored: snapshot.jobs.len(),
        })
    }

    /// Issue the signed request and return the normalized postings
    async fn fetch_postings(&self) -> Result<Vec<JobPosting>, FetchError> {
        let api_url = self
            .settings
            .api_url
            .as_deref()
            .ok_or(FetchError::Configuration("API_URL"))?;
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(FetchError::Configuration("API_KEY"))?;

        info!("Attempting to fetch data from: {}", api_url);
        info!(
            "Origin header is {}",
            if self.settings.allowed_origin.is_some() { "set" } else { "not set" }
        );

        let headers = signed_headers(api_key, self.settings.allowed_origin.as_deref(), Utc::now())?;

        let response = self.client.get(api_url).headers(headers).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "No response text available".to_string());
            error!("API Error ({}): {}", status, body);
            match status {
                StatusCode::UNAUTHORIZED => error!(
                    "Authentication error: check that the API key, timestamp, or HMAC signature is correct"
                ),
                StatusCode::FORBIDDEN => {
                    error!("Authorization error: check that the Origin header is allowed")
                }
                _ => {}
            }
            return Err(FetchError::Upstream { status, body });
        }

        let body = response.bytes().await?;
        let value: Value = serde_json::from_slice(&body)?;

        Ok(parse_postings(value))
    }
}

/// Pull the posting list out of an API response body.
///
/// Expects `{"data": [...]}`. A missing or non-array `data` field yields no
/// postings, and entries that do not look like postings are skipped.
pub fn parse_postings(mut body: Value) -> Vec<JobPosting> {
    let entries = match body.get_mut("data").map(Value::take) {
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            warn!("External API response field `data` is not a list, treating as empty");
            return Vec::new();
        }
        None => {
            warn!("External API response has no `data` field, treating as empty");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<JobPosting>(entry) {
            Ok(posting) => Some(posting.normalize()),
            Err(e) => {
                warn!("Skipping malformed job entry #{}: {}", index, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::signing::{sign, API_KEY_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "test-api-key";

    fn fetcher_for(server: &MockServer, temp_dir: &TempDir) -> JobFetcher {
        let settings = FetcherSettings {
            api_url: Some(format!("{}/jobs", server.uri())),
            api_key: Some(API_KEY.to_string()),
            allowed_origin: Some("https://go9jajobs.com".to_string()),
            timeout: Duration::from_secs(5),
        };
        let cache = Arc::new(JobCache::new(temp_dir.path().join("cache.json")));
        JobFetcher::new(settings, cache).unwrap()
    }

    fn english(id: &str) -> Value {
        json!({
            "id": id,
            "job_id": format!("job-{}", id),
            "title": "Golang Backend Engineer",
            "company": "Acme",
            "description": "Design and ship Go services on Kubernetes.",
            "is_remote": true
        })
    }

    fn portuguese(id: &str) -> Value {
        json!({
            "id": id,
            "job_id": format!("job-{}", id),
            "title": "Desenvolvedor Golang",
            "company": "Empresa BR",
            "description": "Atividades: garantir o suporte da equipe e manutenção preventiva.",
        })
    }

    #[test]
    fn parse_postings_tolerates_bad_shapes() {
        assert!(parse_postings(json!({})).is_empty());
        assert!(parse_postings(json!({"data": "nope"})).is_empty());
        assert!(parse_postings(json!([english("1")])).is_empty());

        let postings = parse_postings(json!({"data": [english("1"), 42, english("2")]}));
        let ids: Vec<_> = postings.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn filters_and_caches_fetched_postings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .and(header(API_KEY_HEADER, API_KEY))
            .and(header("origin", "https://go9jajobs.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [english("1"), portuguese("2"), english("3"), portuguese("4"), english("5")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let fetcher = fetcher_for(&server, &temp_dir);
        let before = Utc::now() - chrono::Duration::seconds(1);

        let outcome = fetcher.fetch_and_cache().await.unwrap();
        assert!(matches!(
            outcome,
            FetchOutcome::Updated { fetched: 5, removed: 2, stored: 3 }
        ));

        let snapshot = fetcher.cache().read().await.unwrap();
        let ids: Vec<_> = snapshot.jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "5"]);
        assert!(snapshot.fetched_at >= before);
        assert!(!fetcher.is_fetching());
    }

    #[tokio::test]
    async fn request_is_signed_over_its_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [english("1")]})))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        fetcher_for(&server, &temp_dir).fetch_and_cache().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let headers = &requests[0].headers;
        let timestamp = headers.get(TIMESTAMP_HEADER).unwrap().to_str().unwrap();
        let signature = headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();

        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert_eq!(signature, sign(API_KEY, timestamp));
        assert_eq!(headers.get("accept").unwrap().to_str().unwrap(), "application/json");
    }

    #[tokio::test]
    async fn server_error_leaves_cache_byte_for_byte() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let fetcher = fetcher_for(&server, &temp_dir);
        fetcher
            .cache()
            .write(vec![serde_json::from_value(english("old")).unwrap()])
            .await
            .unwrap();
        let before = std::fs::read(fetcher.cache().path()).unwrap();

        let err = fetcher.fetch_and_cache().await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Upstream { status: StatusCode::INTERNAL_SERVER_ERROR, .. }
        ));

        let after = std::fs::read(fetcher.cache().path()).unwrap();
        assert_eq!(before, after);
        assert!(!fetcher.is_fetching());
    }

    #[tokio::test]
    async fn non_json_body_aborts_without_touching_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let fetcher = fetcher_for(&server, &temp_dir);

        let err = fetcher.fetch_and_cache().await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
        assert!(fetcher.cache().read().await.is_none());
    }

    #[tokio::test]
    async fn missing_data_field_keeps_previous_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let fetcher = fetcher_for(&server, &temp_dir);
        let previous = fetcher
            .cache()
            .write(vec![serde_json::from_value(english("old")).unwrap()])
            .await
            .unwrap();

        let outcome = fetcher.fetch_and_cache().await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Empty { fetched: 0, removed: 0 }));
        assert_eq!(fetcher.cache().read().await.unwrap(), previous);
    }

    #[tokio::test]
    async fn concurrent_call_is_a_no_op_returning_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [english("new")]}))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let fetcher = fetcher_for(&server, &temp_dir);
        fetcher
            .cache()
            .write(vec![serde_json::from_value(english("old")).unwrap()])
            .await
            .unwrap();

        let (first, second) = tokio::join!(fetcher.fetch_and_cache(), fetcher.fetch_and_cache());

        assert!(matches!(first.unwrap(), FetchOutcome::Updated { stored: 1, .. }));
        match second.unwrap() {
            FetchOutcome::AlreadyRunning(Some(snapshot)) => {
                assert_eq!(snapshot.jobs[0].id, "old");
            }
            other => panic!("expected AlreadyRunning, got {:?}", other),
        }

        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert_eq!(fetcher.cache().read().await.unwrap().jobs[0].id, "new");
    }

    #[tokio::test]
    async fn normalizes_raw_data_at_ingestion() {
        let server = MockServer::start().await;
        let mut posting = english("1");
        posting["raw_data"] = json!(r#"{"company_logo":"https://logo.example/acme.png"}"#);
        posting["tags"] = Value::Null;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [posting]})))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let fetcher = fetcher_for(&server, &temp_dir);
        fetcher.fetch_and_cache().await.unwrap();

        let job = &fetcher.cache().read().await.unwrap().jobs[0];
        assert_eq!(job.company_logo, "https://logo.example/acme.png");
        assert!(job.tags.is_empty());
        assert!(job.raw_data_parsed.is_some());
    }

    #[tokio::test]
    async fn missing_configuration_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(JobCache::new(temp_dir.path().join("cache.json")));
        let fetcher = JobFetcher::new(
            FetcherSettings {
                api_url: Some("http://127.0.0.1:9/jobs".to_string()),
                timeout: Duration::from_secs(1),
                ..Default::default()
            },
            cache,
        )
        .unwrap();

        let err = fetcher.fetch_and_cache().await.unwrap_err();
        assert!(matches!(err, FetchError::Configuration("API_KEY")));
        assert!(!fetcher.is_fetching());
    }
}
