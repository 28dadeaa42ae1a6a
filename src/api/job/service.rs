use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use actix_web::{HttpResponse, ResponseError};
use chrono::{Duration, SecondsFormat, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use super::dto::{
    CompanySummary, JobDetailResponse, JobListResponse, JobQuery, MessageResponse, TriggerResponse,
    UpdateCacheRequest, UpdateCacheResponse,
};
use super::models::JobPosting;
use crate::api::validation::ErrorResponse;
use crate::cache::{is_expired, CacheError, CacheSnapshot};
use crate::fetcher::{FetchError, FetchOutcome, JobFetcher};
use crate::filter::filter_non_english;
use crate::format::format_description;

/// Service-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or wrong admin secret, or no secret configured
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Job not found: {0}")]
    NotFound(String),

    /// Request passed authorization but its payload is unusable
    #[error("{0}")]
    BadRequest(String),

    /// Upstream settings are missing on the server
    #[error("{0}")]
    Configuration(String),

    /// The fetch from the external API failed
    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<FetchError> for ServiceError {
    fn from(err: FetchError) -> Self {
        let message = err.to_string();
        match err {
            FetchError::Configuration(_) => ServiceError::Configuration(message),
            FetchError::Cache(e) => ServiceError::Cache(e),
            _ => ServiceError::Upstream(message),
        }
    }
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::Unauthorized => {
                warn!("Rejected admin request: invalid or missing secret");
                HttpResponse::Forbidden().json(ErrorResponse::new("Unauthorized", "Invalid or missing secret"))
            }
            ServiceError::NotFound(job_id) => {
                warn!("Job not found: {}", job_id);
                HttpResponse::NotFound().json(ErrorResponse::new(
                    "Not found",
                    format!("Job with id {} not found", job_id),
                ))
            }
            ServiceError::BadRequest(msg) => {
                warn!("Bad request: {}", msg);
                HttpResponse::BadRequest().json(ErrorResponse::new("Request validation failed", msg.clone()))
            }
            ServiceError::Configuration(msg) => {
                error!("Configuration error: {}", msg);
                HttpResponse::InternalServerError().json(ErrorResponse::new("Server is not configured", msg.clone()))
            }
            ServiceError::Upstream(msg) => {
                error!("Upstream error: {}", msg);
                HttpResponse::BadGateway().json(ErrorResponse::new("Failed to fetch jobs from external API", msg.clone()))
            }
            ServiceError::Cache(e) => {
                error!("Cache error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse::new(
                    "Failed to update cache",
                    "Cache storage error occurred",
                ))
            }
        }
    }
}

/// Job service containing the read and admin logic behind the HTTP API
pub struct JobService {
    fetcher: Arc<JobFetcher>,
    admin_secret: Option<String>,
    max_age: Duration,
}

impl JobService {
    pub fn new(fetcher: Arc<JobFetcher>, admin_secret: Option<String>, max_age: Duration) -> Self {
        Self {
            fetcher,
            admin_secret,
            max_age,
        }
    }

    /// Check a caller-supplied admin secret.
    ///
    /// Fails when no secret is configured, so the admin endpoints are closed
    /// by default.
    pub fn authorize(&self, secret: Option<&str>) -> Result<(), ServiceError> {
        match (self.admin_secret.as_deref(), secret) {
            (Some(expected), Some(given)) if expected == given => Ok(()),
            _ => Err(ServiceError::Unauthorized),
        }
    }

    /// The cached snapshot, fetching once when the cache is absent or empty.
    ///
    /// A failed fetch is logged and whatever was cached before is returned.
    pub async fn current_snapshot(&self) -> Option<CacheSnapshot> {
        let cached = self.fetcher.cache().read().await;
        if cached.as_ref().is_some_and(|s| !s.jobs.is_empty()) {
            return cached;
        }

        info!("Job cache is empty, fetching from external API");
        match self.fetcher.fetch_and_cache().await {
            Ok(FetchOutcome::Updated { .. }) => self.fetcher.cache().read().await,
            Ok(FetchOutcome::AlreadyRunning(snapshot)) => snapshot.or(cached),
            Ok(FetchOutcome::Empty { .. }) => cached,
            Err(e) => {
                warn!("Lazy fetch failed, serving cached jobs: {}", e);
                cached
            }
        }
    }

    /// Cached postings matching `query`, newest first
    pub async fn list_jobs(&self, query: &JobQuery) -> JobListResponse {
        let snapshot = self.current_snapshot().await;
        let stale = is_expired(snapshot.as_ref(), self.max_age, false);
        let last_fetch_time = snapshot.as_ref().map(|s| s.fetched_at.timestamp_millis());

        let mut jobs = snapshot.map(|s| s.jobs).unwrap_or_default();
        let locations = distinct_values(&jobs, |job| &job.location);
        let job_types = distinct_values(&jobs, |job| &job.job_type);

        jobs.retain(|job| matches_query(job, query));
        sort_newest_first(&mut jobs);

        let total = jobs.len();
        if let Some(limit) = query.limit {
            jobs.truncate(limit);
        }

        JobListResponse {
            data: jobs,
            total,
            last_fetch_time,
            stale,
            locations,
            job_types,
        }
    }

    /// One posting by its `job_id`, with its description broken into blocks
    pub async fn get_job(&self, job_id: &str) -> Result<JobDetailResponse, ServiceError> {
        let job = self
            .current_snapshot()
            .await
            .and_then(|s| s.jobs.into_iter().find(|job| job.job_id == job_id))
            .ok_or_else(|| ServiceError::NotFound(job_id.to_string()))?;

        let description = format_description(&job.description);
        Ok(JobDetailResponse { job, description })
    }

    /// Companies with cached postings, most postings first
    pub async fn companies(&self, search: Option<&str>) -> Vec<CompanySummary> {
        let jobs = self.current_snapshot().await.map(|s| s.jobs).unwrap_or_default();
        let mut companies = summarize_companies(&jobs);

        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            companies.retain(|c| c.name.to_lowercase().contains(&term));
        }
        companies
    }

    /// Run a fetch now, on behalf of an admin
    pub async fn trigger_fetch(&self, secret: Option<&str>) -> Result<TriggerResponse, ServiceError> {
        self.authorize(secret)?;
        info!("Manual trigger: running job fetch to update cache");

        let message = match self.fetcher.fetch_and_cache().await? {
            FetchOutcome::Updated { stored, .. } => {
                format!("Cache update job completed: {} jobs cached", stored)
            }
            FetchOutcome::Empty { .. } => "No jobs returned, cache left unchanged".to_string(),
            FetchOutcome::AlreadyRunning(_) => "A job fetch is already in progress".to_string(),
        };

        Ok(TriggerResponse {
            success: true,
            message,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    pub async fn clear_cache(&self, secret: Option<&str>) -> Result<MessageResponse, ServiceError> {
        self.authorize(secret)?;

        let message = if self.fetcher.cache().clear().await? {
            "Cache cleared"
        } else {
            "No cache found to clear"
        };

        Ok(MessageResponse {
            success: true,
            message: message.to_string(),
        })
    }

    /// Replace the cache with postings fetched out of process.
    ///
    /// The secret is checked before the postings are looked at. An empty
    /// list is accepted and leaves an empty cache behind.
    pub async fn update_cache(&self, request: UpdateCacheRequest) -> Result<UpdateCacheResponse, ServiceError> {
        if self.authorize(request.secret.as_deref()).is_err() {
            error!("Invalid or missing secret for cache update");
            return Err(ServiceError::Unauthorized);
        }

        let jobs: Vec<JobPosting> = serde_json::from_value(request.jobs).map_err(|e| {
            warn!("Rejected cache update payload: {}", e);
            ServiceError::BadRequest("Invalid jobs data".to_string())
        })?;
        let jobs: Vec<JobPosting> = jobs.into_iter().map(JobPosting::normalize).collect();
        let (jobs, _) = filter_non_english(jobs);

        let snapshot = self.fetcher.cache().write(jobs).await?;
        let count = snapshot.jobs.len();
        info!("Cache updated via API with {} jobs", count);

        Ok(UpdateCacheResponse {
            success: true,
            message: format!("Cache updated with {} jobs", count),
            count,
        })
    }
}

fn matches_query(job: &JobPosting, query: &JobQuery) -> bool {
    let location = query.location.as_deref().filter(|l| !l.is_empty());
    let job_type = query.job_type.as_deref().filter(|t| !t.is_empty());

    location.map_or(true, |l| job.location == l)
        && job_type.map_or(true, |t| job.job_type == t)
        && (query.remote != Some(true) || job.is_remote)
}

/// Sorted, deduplicated, non-empty values of one field, for filter choices
fn distinct_values<F>(jobs: &[JobPosting], field: F) -> Vec<String>
where
    F: Fn(&JobPosting) -> &String,
{
    let values: BTreeSet<&String> = jobs.iter().map(field).filter(|v| !v.is_empty()).collect();
    values.into_iter().cloned().collect()
}

fn sort_newest_first(jobs: &mut [JobPosting]) {
    jobs.sort_by_key(|job| std::cmp::Reverse(job.posted_timestamp()));
}

/// Group postings by company name, counting postings and picking the first
/// non-empty logo. Postings without a company are skipped.
pub fn summarize_companies(jobs: &[JobPosting]) -> Vec<CompanySummary> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, CompanySummary> = HashMap::new();

    for job in jobs.iter().filter(|job| !job.company.is_empty()) {
        let entry = by_name.entry(job.company.clone()).or_insert_with(|| {
            order.push(job.company.clone());
            CompanySummary {
                name: job.company.clone(),
                logo: String::new(),
                job_count: 0,
            }
        });
        entry.job_count += 1;
        if entry.logo.is_empty() && !job.company_logo.is_empty() {
            entry.logo = job.company_logo.clone();
        }
    }

    let mut companies: Vec<CompanySummary> = order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect();
    companies.sort_by(|a, b| b.job_count.cmp(&a.job_count));
    companies
}
