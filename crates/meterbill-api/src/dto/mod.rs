//! Response bodies that are not entity records
//!
//! Entity routes answer with the bare record; only deletes and the health
//! check need a body of their own.

use meterbill_core::EntityKind;
use serde::{Deserialize, Serialize};

/// Confirmation returned by delete endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// `"<Entity> deleted successfully"`
    pub fn deleted(kind: EntityKind) -> Self {
        Self::new(format!("{} deleted successfully", kind))
    }
}

/// Health check body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: "meterbill".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
