//! API layer for MeterBill
//!
//! HTTP handlers for customers, meters, readings and bills, all served
//! under `/api` from a shared [`meterbill_db::EntityStore`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod dto;
pub mod handlers;

use actix_web::{web, HttpRequest};
use meterbill_core::AppError;
use tracing::warn;

pub use dto::{HealthResponse, MessageResponse};
pub use handlers::{
    configure_bills, configure_customers, configure_meters, configure_readings, health_check,
};

/// Mount every route under `/api`
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Health check
            .route("/ping", web::get().to(health_check))
            .configure(configure_customers)
            .configure(configure_meters)
            .configure(configure_readings)
            .configure(configure_bills),
    );
}

/// JSON extractor settings: malformed bodies answer 400 in the usual
/// error shape instead of actix's plain-text default
pub fn json_config(limit_bytes: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit_bytes)
        .error_handler(|err, req: &HttpRequest| {
            warn!(path = %req.path(), "Rejected request body: {}", err);
            AppError::InvalidInput(err.to_string()).into()
        })
}

/// Path extractor settings: a non-numeric id answers 400
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, req: &HttpRequest| {
        warn!(path = %req.path(), "Rejected path: {}", err);
        AppError::InvalidInput(err.to_string()).into()
    })
}
