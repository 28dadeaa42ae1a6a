use serde::{Deserialize, Serialize};
use validator::Validate;

use super::models::JobPosting;
use crate::format::DescriptionBlock;

/// Query for `GET /api/jobs`. Location and job type match exactly.
#[derive(Debug, Default, Deserialize)]
pub struct JobQuery {
    pub location: Option<String>,
    pub job_type: Option<String>,
    /// `true` keeps remote postings only
    pub remote: Option<bool>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompanyQuery {
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SecretQuery {
    pub secret: Option<String>,
}

/// Response for the job listing
#[derive(Debug, Serialize, Deserialize)]
pub struct JobListResponse {
    pub data: Vec<JobPosting>,
    /// Matching postings before `limit` was applied
    pub total: usize,
    /// Milliseconds since the epoch, absent when nothing is cached
    #[serde(rename = "lastFetchTime")]
    pub last_fetch_time: Option<i64>,
    pub stale: bool,
    /// Distinct non-empty locations across the whole cache, sorted
    pub locations: Vec<String>,
    /// Distinct non-empty job types across the whole cache, sorted
    #[serde(rename = "jobTypes")]
    pub job_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct JobDetailResponse {
    pub job: JobPosting,
    pub description: Vec<DescriptionBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub name: String,
    pub logo: String,
    pub job_count: usize,
}

/// Response for the manual fetch trigger
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Body for `POST /api/update-cache`.
///
/// `jobs` stays untyped until the secret has been checked, so a caller
/// without the secret learns nothing about the expected shape.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCacheRequest {
    #[serde(default)]
    pub jobs: serde_json::Value,
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateCacheResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
}
