//! Reading handlers

use crate::dto::MessageResponse;
use actix_web::{web, HttpResponse};
use meterbill_core::models::{NewReading, ReadingPatch};
use meterbill_core::{AppError, EntityKind};
use meterbill_db::EntityStore;
use tracing::{info, instrument};

#[instrument(skip(store))]
pub async fn list_readings(store: web::Data<EntityStore>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(store.list_readings().await?))
}

#[instrument(skip(store, req))]
pub async fn create_reading(
    store: web::Data<EntityStore>,
    req: web::Json<NewReading>,
) -> Result<HttpResponse, AppError> {
    let reading = store.create_reading(req.into_inner()).await?;
    info!(reading_id = reading.reading_id, meter_id = reading.meter_id, "Reading recorded");
    Ok(HttpResponse::Created().json(reading))
}

#[instrument(skip(store))]
pub async fn get_reading(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(store.get_reading(path.into_inner()).await?))
}

#[instrument(skip(store, req))]
pub async fn update_reading(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
    req: web::Json<ReadingPatch>,
) -> Result<HttpResponse, AppError> {
    let reading = store
        .update_reading(path.into_inner(), req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(reading))
}

#[instrument(skip(store))]
pub async fn delete_reading(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    store.delete_reading(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::deleted(EntityKind::Reading)))
}

/// Configure reading routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/readings")
            .route("", web::get().to(list_readings))
            .route("", web::post().to(create_reading))
            .route("/{id}", web::get().to(get_reading))
            .route("/{id}", web::put().to(update_reading))
            .route("/{id}", web::patch().to(update_reading))
            .route("/{id}", web::delete().to(delete_reading)),
    );
}
