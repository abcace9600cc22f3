use actix_web::{HttpResponse, delete, get, patch, post, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uptrack_service::Orchestrator;
use uptrack_service::registry::{TimeRange, UrlSettings};
use uptrack_service::validation::split_bulk_input;
use uuid::Uuid;

use crate::error::AppError;

macros_utils::routes! {
    scope "/api/urls" =>
    route list_urls,
    route add_url,
    route add_bulk,
    route check_all,
    route url_summary,
    route remove_url,
    route update_url,
}

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    url: String,
}

/// Either a list of URLs or newline-separated text; both may be given.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BulkRequest {
    urls: Vec<String>,
    text: Option<String>,
}

impl BulkRequest {
    fn candidates(self) -> Vec<String> {
        let mut candidates: Vec<String> =
            self.urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()).map(str::to_string).collect();
        if let Some(text) = &self.text {
            candidates.extend(split_bulk_input(text));
        }
        candidates
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default)]
    range: TimeRange,
}

#[get("")]
pub async fn list_urls(orchestrator: web::Data<Orchestrator>) -> HttpResponse {
    HttpResponse::Ok().json(orchestrator.list())
}

#[post("")]
pub async fn add_url(
    orchestrator: web::Data<Orchestrator>,
    body: web::Json<AddRequest>,
) -> Result<HttpResponse, AppError> {
    let added = orchestrator.add_monitored_url(&body.url)?;
    Ok(HttpResponse::Created().json(added))
}

#[post("/bulk")]
pub async fn add_bulk(
    orchestrator: web::Data<Orchestrator>,
    body: web::Json<BulkRequest>,
) -> Result<HttpResponse, AppError> {
    let report = orchestrator.add_bulk(&body.into_inner().candidates())?;
    Ok(HttpResponse::Ok().json(report))
}

/// Queue a batch check of every enabled URL; results land in the registry.
#[post("/check-all")]
pub async fn check_all(orchestrator: web::Data<Orchestrator>) -> HttpResponse {
    let queued = orchestrator.registry().enabled().len();
    // Detached: callers poll the URL list for results.
    drop(orchestrator.check_all_now());
    info!(queued, "Check-all accepted");
    HttpResponse::Accepted().json(json!({ "queued": queued }))
}

#[get("/{id}/summary")]
pub async fn url_summary(
    orchestrator: web::Data<Orchestrator>,
    id: web::Path<Uuid>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let summary = orchestrator
        .summary(id, query.range)
        .ok_or_else(|| AppError::NotFound(format!("URL {id}")))?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Removing an unknown id is not an error.
#[delete("/{id}")]
pub async fn remove_url(orchestrator: web::Data<Orchestrator>, id: web::Path<Uuid>) -> HttpResponse {
    orchestrator.remove_monitored_url(id.into_inner());
    HttpResponse::NoContent().finish()
}

#[patch("/{id}")]
pub async fn update_url(
    orchestrator: web::Data<Orchestrator>,
    id: web::Path<Uuid>,
    body: web::Json<UrlSettings>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let updated = orchestrator
        .update_settings(id, body.into_inner())?
        .ok_or_else(|| AppError::NotFound(format!("URL {id}")))?;
    Ok(HttpResponse::Ok().json(updated))
}
