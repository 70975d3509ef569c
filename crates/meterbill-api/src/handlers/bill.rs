//! Bill handlers
//!
//! A bill posted with a `reading_id` takes its units and billing date from
//! that reading unless the body sets them; updates never re-derive.

use crate::dto::MessageResponse;
use actix_web::{web, HttpResponse};
use meterbill_core::models::{BillPatch, NewBill};
use meterbill_core::{AppError, EntityKind};
use meterbill_db::EntityStore;
use tracing::{debug, info, instrument};

/// List all bills
///
/// GET /api/bills
#[instrument(skip(store))]
pub async fn list_bills(store: web::Data<EntityStore>) -> Result<HttpResponse, AppError> {
    let bills = store.list_bills().await?;
    debug!(count = bills.len(), "Listed bills");
    Ok(HttpResponse::Ok().json(bills))
}

/// Create a bill
///
/// POST /api/bills
#[instrument(skip(store, req))]
pub async fn create_bill(
    store: web::Data<EntityStore>,
    req: web::Json<NewBill>,
) -> Result<HttpResponse, AppError> {
    let bill = store.create_bill(req.into_inner()).await?;
    info!(
        bill_id = bill.bill_id,
        customer_id = bill.customer_id,
        amount_due = %bill.amount_due,
        "Bill created"
    );
    Ok(HttpResponse::Created().json(bill))
}

/// Get a bill by id
///
/// GET /api/bills/{id}
#[instrument(skip(store))]
pub async fn get_bill(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(store.get_bill(path.into_inner()).await?))
}

/// Update a bill
///
/// PUT|PATCH /api/bills/{id}
#[instrument(skip(store, req))]
pub async fn update_bill(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
    req: web::Json<BillPatch>,
) -> Result<HttpResponse, AppError> {
    let bill = store.update_bill(path.into_inner(), req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(bill))
}

/// Delete a bill
///
/// DELETE /api/bills/{id}
#[instrument(skip(store))]
pub async fn delete_bill(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    store.delete_bill(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::deleted(EntityKind::Bill)))
}

/// Configure bill routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bills")
            .route("", web::get().to(list_bills))
            .route("", web::post().to(create_bill))
            .route("/{id}", web::get().to(get_bill))
            .route("/{id}", web::put().to(update_bill))
            .route("/{id}", web::patch().to(update_bill))
            .route("/{id}", web::delete().to(delete_bill)),
    );
}
