use actix_web::{
    get, post,
    web::{Data, Path, Query, ServiceConfig},
    HttpResponse, Responder,
};
use actix_web_validator::Json;

use super::dto::{CompanyQuery, JobQuery, SecretQuery, UpdateCacheRequest};
use super::service::{JobService, ServiceError};

#[get("/jobs")]
async fn list_jobs(service: Data<JobService>, query: Query<JobQuery>) -> impl Responder {
    HttpResponse::Ok().json(service.list_jobs(&query).await)
}

#[get("/jobs/{job_id}")]
async fn get_job(service: Data<JobService>, job_id: Path<String>) -> Result<HttpResponse, ServiceError> {
    let detail = service.get_job(&job_id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[get("/companies")]
async fn list_companies(service: Data<JobService>, query: Query<CompanyQuery>) -> impl Responder {
    HttpResponse::Ok().json(service.companies(query.search.as_deref()).await)
}

#[get("/run-scheduler")]
async fn run_scheduler(service: Data<JobService>, query: Query<SecretQuery>) -> Result<HttpResponse, ServiceError> {
    let response = service.trigger_fetch(query.secret.as_deref()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/clear-cache")]
async fn clear_cache(service: Data<JobService>, query: Query<SecretQuery>) -> Result<HttpResponse, ServiceError> {
    let response = service.clear_cache(query.secret.as_deref()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/update-cache")]
async fn update_cache(service: Data<JobService>, body: Json<UpdateCacheRequest>) -> Result<HttpResponse, ServiceError> {
    let response = service.update_cache(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Public read endpoints under `/api`
pub fn job_config(config: &mut ServiceConfig) {
    config
        .service(list_jobs)
        .service(get_job)
        .service(list_companies);
}

/// Secret-guarded cache administration under `/api`
pub fn admin_config(config: &mut ServiceConfig) {
    config
        .service(run_scheduler)
        .service(clear_cache)
        .service(update_cache);
}
