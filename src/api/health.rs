use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;
use tracing::warn;

use crate::fetcher::JobFetcher;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    cache: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    jobs: Option<usize>,
    #[serde(rename = "lastFetchTime", skip_serializing_if = "Option::is_none")]
    last_fetch_time: Option<i64>,
    /// Whether a fetch from the external API is running right now
    #[serde(skip_serializing_if = "Option::is_none")]
    fetching: Option<bool>,
}

impl HealthResponse {
    async fn from_fetcher(status: &str, fetcher: &JobFetcher) -> (bool, Self) {
        let fetching = Some(fetcher.is_fetching());
        match fetcher.cache().read().await {
            Some(snapshot) => (
                true,
                Self {
                    status: status.to_string(),
                    cache: "present".to_string(),
                    jobs: Some(snapshot.jobs.len()),
                    last_fetch_time: Some(snapshot.fetched_at.timestamp_millis()),
                    fetching,
                },
            ),
            None => (
                false,
                Self {
                    status: status.to_string(),
                    cache: "missing".to_string(),
                    jobs: None,
                    last_fetch_time: None,
                    fetching,
                },
            ),
        }
    }
}

/// Health check endpoint
///
/// Reports the cache state. The service stays healthy without a cache since
/// it keeps serving an empty list until the next fetch.
#[get("/health")]
async fn health_check(fetcher: web::Data<JobFetcher>) -> impl Responder {
    let (_, response) = HealthResponse::from_fetcher("healthy", &fetcher).await;
    HttpResponse::Ok().json(response)
}

/// Readiness check endpoint
///
/// Returns 503 until a cache snapshot exists.
#[get("/ready")]
async fn readiness_check(fetcher: web::Data<JobFetcher>) -> impl Responder {
    match HealthResponse::from_fetcher("ready", &fetcher).await {
        (true, response) => HttpResponse::Ok().json(response),
        (false, mut response) => {
            warn!("Readiness check failed: no job cache yet");
            response.status = "not_ready".to_string();
            HttpResponse::ServiceUnavailable().json(response)
        }
    }
}

/// Liveness check endpoint
///
/// Simple check that the process is alive. Does not look at the cache.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive".to_string(),
        cache: "not_checked".to_string(),
        jobs: None,
        last_fetch_time: None,
        fetching: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::job::JobPosting;
    use crate::cache::JobCache;
    use crate::fetcher::FetcherSettings;
    use actix_web::{http::StatusCode, test, App};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[actix_web::test]
    async fn ready_waits_for_a_cache_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(JobCache::new(temp_dir.path().join("cache.json")));
        let fetcher = JobFetcher::new(FetcherSettings::default(), cache.clone()).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fetcher))
                .configure(health_config),
        )
        .await;

        let req = test::TestRequest::get().uri("/ready").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::SERVICE_UNAVAILABLE);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["cache"], "missing");
        assert_eq!(body["fetching"], false);

        cache
            .write(vec![JobPosting {
                id: "1".into(),
                ..Default::default()
            }])
            .await
            .unwrap();

        let req = test::TestRequest::get().uri("/ready").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["jobs"], 1);
    }

    #[actix_web::test]
    async fn live_does_not_need_a_cache() {
        let app = test::init_service(App::new().configure(health_config)).await;

        let req = test::TestRequest::get().uri("/live").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "alive");
    }
}
