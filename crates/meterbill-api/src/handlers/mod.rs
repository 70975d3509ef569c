//! HTTP request handlers

pub mod bill;
pub mod customer;
pub mod health;
pub mod meter;
pub mod reading;

pub use bill::configure as configure_bills;
pub use customer::configure as configure_customers;
pub use health::health_check;
pub use meter::configure as configure_meters;
pub use reading::configure as configure_readings;
