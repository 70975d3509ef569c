//! Meter handlers
//!
//! Every meter body carries its owner's name.

use crate::dto::MessageResponse;
use actix_web::{web, HttpResponse};
use meterbill_core::models::{MeterPatch, NewMeter};
use meterbill_core::{AppError, EntityKind};
use meterbill_db::EntityStore;
use tracing::{debug, info, instrument};

/// GET /api/meters
#[instrument(skip(store))]
pub async fn list_meters(store: web::Data<EntityStore>) -> Result<HttpResponse, AppError> {
    let meters = store.list_meter_details().await?;
    debug!(count = meters.len(), "Listed meters");
    Ok(HttpResponse::Ok().json(meters))
}

/// POST /api/meters
#[instrument(skip(store, req))]
pub async fn create_meter(
    store: web::Data<EntityStore>,
    req: web::Json<NewMeter>,
) -> Result<HttpResponse, AppError> {
    let meter = store.create_meter(req.into_inner()).await?;
    info!(meter_id = meter.meter_id, meter_number = %meter.meter_number, "Meter created");
    Ok(HttpResponse::Created().json(store.describe_meter(meter).await?))
}

/// GET /api/meters/{id}
#[instrument(skip(store))]
pub async fn get_meter(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let meter = store.get_meter_detail(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(meter))
}

/// PUT|PATCH /api/meters/{id}
#[instrument(skip(store, req))]
pub async fn update_meter(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
    req: web::Json<MeterPatch>,
) -> Result<HttpResponse, AppError> {
    let meter = store.update_meter(path.into_inner(), req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(store.describe_meter(meter).await?))
}

/// DELETE /api/meters/{id}
#[instrument(skip(store))]
pub async fn delete_meter(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    store.delete_meter(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::deleted(EntityKind::Meter)))
}

/// Configure meter routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/meters")
            .route("", web::get().to(list_meters))
            .route("", web::post().to(create_meter))
            .route("/{id}", web::get().to(get_meter))
            .route("/{id}", web::put().to(update_meter))
            .route("/{id}", web::patch().to(update_meter))
            .route("/{id}", web::delete().to(delete_meter)),
    );
}
