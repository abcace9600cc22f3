use actix_web::{HttpResponse, post, web};
use serde::Deserialize;
use uptrack_service::{MonitorError, Orchestrator};

use crate::error::AppError;

macros_utils::routes! {
    route check_url_route,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    url: Option<String>,
}

/// One-off check of a URL that need not be monitored.
#[post("/api/check-url")]
pub async fn check_url_route(
    orchestrator: web::Data<Orchestrator>,
    body: web::Json<CheckRequest>,
) -> Result<HttpResponse, AppError> {
    let Some(url) = body.into_inner().url.filter(|u| !u.trim().is_empty()) else {
        return Err(MonitorError::validation("URL is required").into());
    };

    let verdict = orchestrator.check_url(&url).await?;
    Ok(HttpResponse::Ok().json(verdict))
}
