//! MeterBill Database Layer
//!
//! This crate provides storage for the MeterBill entity store. It includes:
//!
//! - Connection pool management and embedded migrations with sqlx
//! - PostgreSQL repositories for customers, meters, readings and bills,
//!   each operation running in a single transaction
//! - In-memory repositories with the same rules, for tests and local runs
//! - [`EntityStore`], the handle the API layer is given

pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod store;

pub use migrations::run_migrations;
pub use pool::create_pool;
pub use repositories::*;
pub use store::EntityStore;

// Re-export commonly used types
pub use meterbill_core::{AppError, AppResult};
pub use sqlx::PgPool;
