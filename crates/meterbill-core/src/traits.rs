//! Repository traits
//!
//! Every storage backend implements one repository per entity type. Each
//! method is a complete unit of work: it validates references, enforces the
//! delete-blocking rules and either commits everything or nothing.

use crate::error::AppError;
use crate::models::{
    Bill, BillPatch, Customer, CustomerPatch, Meter, MeterDetail, MeterPatch, NewBill,
    NewCustomer, NewMeter, NewReading, Reading, ReadingPatch,
};
use async_trait::async_trait;

/// Generic repository trait for CRUD operations
#[async_trait]
pub trait Repository<T, ID>: Send + Sync {
    /// Input accepted by `create`
    type Create: Send + 'static;

    /// Merge-patch accepted by `update`
    type Patch: Send + 'static;

    /// All records, ordered by identity
    async fn find_all(&self) -> Result<Vec<T>, AppError>;

    /// Find entity by ID
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, AppError>;

    /// Validate references, apply defaults, assign an identity and persist
    async fn create(&self, input: Self::Create) -> Result<T, AppError>;

    /// Overwrite the fields named by `patch`; `NotFound` if `id` is absent
    async fn update(&self, id: ID, patch: Self::Patch) -> Result<T, AppError>;

    /// Remove the record; `NotFound` if absent, `Conflict` if still referenced
    async fn delete(&self, id: ID) -> Result<(), AppError>;
}

/// Customer repository
pub trait CustomerRepository:
    Repository<Customer, i32, Create = NewCustomer, Patch = CustomerPatch>
{
}

/// Meter repository with owner-enriched lookups
#[async_trait]
pub trait MeterRepository: Repository<Meter, i32, Create = NewMeter, Patch = MeterPatch> {
    /// All meters with their owner's name
    async fn find_all_detailed(&self) -> Result<Vec<MeterDetail>, AppError>;

    /// One meter with its owner's name
    async fn find_detailed(&self, id: i32) -> Result<Option<MeterDetail>, AppError>;
}

/// Reading repository
pub trait ReadingRepository:
    Repository<Reading, i32, Create = NewReading, Patch = ReadingPatch>
{
}

/// Bill repository
///
/// `create` runs the bill derivation against the linked reading inside the
/// same unit of work that inserts the bill.
pub trait BillRepository: Repository<Bill, i32, Create = NewBill, Patch = BillPatch> {}
