//! Referential rules shared by every storage backend
//!
//! The four entity types form a chain: a Customer owns Meters, a Meter owns
//! Readings and a Reading may be billed. Deletes never cascade; a record
//! with live dependents is kept and the caller gets [`AppError::Conflict`].

use crate::error::AppError;
use crate::AppResult;
use std::fmt;

/// The persisted record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Customer,
    Meter,
    Reading,
    Bill,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Customer => write!(f, "Customer"),
            EntityKind::Meter => write!(f, "Meter"),
            EntityKind::Reading => write!(f, "Reading"),
            EntityKind::Bill => write!(f, "Bill"),
        }
    }
}

impl EntityKind {
    /// Record types whose rows hold a reference to this kind and therefore
    /// block its deletion
    pub fn dependents(&self) -> &'static [EntityKind] {
        match self {
            EntityKind::Customer => &[EntityKind::Meter, EntityKind::Bill],
            EntityKind::Meter => &[EntityKind::Reading],
            EntityKind::Reading => &[EntityKind::Bill],
            EntityKind::Bill => &[],
        }
    }

    /// Plural, lower-case name used in messages and routes
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Customer => "customers",
            EntityKind::Meter => "meters",
            EntityKind::Reading => "readings",
            EntityKind::Bill => "bills",
        }
    }
}

/// Reject the delete of `kind` `id` when `count` records of `dependent`
/// still reference it.
pub fn ensure_no_dependents(
    kind: EntityKind,
    id: i32,
    dependent: EntityKind,
    count: i64,
) -> AppResult<()> {
    if count > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete {} {}: {} {} still reference it",
            kind,
            id,
            count,
            dependent.plural()
        )));
    }
    Ok(())
}
