//! Health check

use crate::dto::HealthResponse;
use actix_web::HttpResponse;

/// GET /api/ping
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse::healthy())
}
