//! Customer handlers
//!
//! HTTP handlers for customer endpoints.

use crate::dto::MessageResponse;
use actix_web::{web, HttpResponse};
use meterbill_core::models::{CustomerPatch, NewCustomer};
use meterbill_core::{AppError, EntityKind};
use meterbill_db::EntityStore;
use tracing::{debug, info, instrument};

/// List all customers
///
/// GET /api/customers
#[instrument(skip(store))]
pub async fn list_customers(store: web::Data<EntityStore>) -> Result<HttpResponse, AppError> {
    let customers = store.list_customers().await?;
    debug!(count = customers.len(), "Listed customers");
    Ok(HttpResponse::Ok().json(customers))
}

/// Create a customer
///
/// POST /api/customers
#[instrument(skip(store, req))]
pub async fn create_customer(
    store: web::Data<EntityStore>,
    req: web::Json<NewCustomer>,
) -> Result<HttpResponse, AppError> {
    let customer = store.create_customer(req.into_inner()).await?;
    info!(customer_id = customer.customer_id, "Customer created");
    Ok(HttpResponse::Created().json(customer))
}

/// Get a customer by id
///
/// GET /api/customers/{id}
#[instrument(skip(store))]
pub async fn get_customer(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let customer = store.get_customer(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(customer))
}

/// Update a customer; only the fields present in the body change
///
/// PUT|PATCH /api/customers/{id}
#[instrument(skip(store, req))]
pub async fn update_customer(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
    req: web::Json<CustomerPatch>,
) -> Result<HttpResponse, AppError> {
    let customer = store
        .update_customer(path.into_inner(), req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(customer))
}

/// Delete a customer that has no meters or bills
///
/// DELETE /api/customers/{id}
#[instrument(skip(store))]
pub async fn delete_customer(
    store: web::Data<EntityStore>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    store.delete_customer(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::deleted(EntityKind::Customer)))
}

/// Configure customer routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/customers")
            .route("", web::get().to(list_customers))
            .route("", web::post().to(create_customer))
            .route("/{id}", web::get().to(get_customer))
            .route("/{id}", web::put().to(update_customer))
            .route("/{id}", web::patch().to(update_customer))
            .route("/{id}", web::delete().to(delete_customer)),
    );
}
