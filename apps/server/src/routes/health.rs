use actix_web::{HttpResponse, Responder, get, web};
use uptrack_service::Orchestrator;

macros_utils::routes! {
    route health_route,
}

/// Liveness plus a few registry and scheduler figures.
#[get("/health")]
pub async fn health_route(orchestrator: web::Data<Orchestrator>) -> impl Responder {
    HttpResponse::Ok().json(orchestrator.health())
}
