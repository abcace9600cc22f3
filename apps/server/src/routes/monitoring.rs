use std::time::Duration;

use actix_web::{HttpResponse, get, post, put, web};
use serde::Deserialize;
use uptrack_service::Orchestrator;

use crate::error::AppError;

macros_utils::routes! {
    scope "/api/monitoring" =>
    route monitoring_status,
    route start_monitoring,
    route stop_monitoring,
    route set_interval,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRequest {
    interval_seconds: u64,
}

#[get("")]
pub async fn monitoring_status(orchestrator: web::Data<Orchestrator>) -> HttpResponse {
    HttpResponse::Ok().json(orchestrator.monitoring_status())
}

#[post("/start")]
pub async fn start_monitoring(orchestrator: web::Data<Orchestrator>) -> HttpResponse {
    orchestrator.start_monitoring();
    HttpResponse::Ok().json(orchestrator.monitoring_status())
}

#[post("/stop")]
pub async fn stop_monitoring(orchestrator: web::Data<Orchestrator>) -> HttpResponse {
    orchestrator.stop_monitoring();
    HttpResponse::Ok().json(orchestrator.monitoring_status())
}

#[put("/interval")]
pub async fn set_interval(
    orchestrator: web::Data<Orchestrator>,
    body: web::Json<IntervalRequest>,
) -> Result<HttpResponse, AppError> {
    orchestrator.set_monitoring_interval(Duration::from_secs(body.interval_seconds))?;
    Ok(HttpResponse::Ok().json(orchestrator.monitoring_status()))
}
