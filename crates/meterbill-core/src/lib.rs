//! MeterBill Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the MeterBill system. It includes:
//!
//! - Domain models (Customer, Meter, Reading, Bill) with their create and patch inputs
//! - Bill derivation and delete-blocking rules shared by every storage backend
//! - Repository traits implemented by the database layer
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod rules;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;
pub use rules::EntityKind;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
