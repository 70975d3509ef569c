//! Repository implementations
//!
//! PostgreSQL implementations of the repository traits defined in
//! meterbill-core. Every write runs in its own transaction:
//!
//! - a referenced parent row is locked `FOR KEY SHARE` before the child is
//!   written, so a concurrent delete of that parent waits for us
//! - a row being updated or deleted is locked `FOR UPDATE` first
//! - dependents are counted only after the row lock is held

pub mod bill_repo;
pub mod customer_repo;
pub mod meter_repo;
pub mod reading_repo;

pub use bill_repo::PgBillRepository;
pub use customer_repo::PgCustomerRepository;
pub use meter_repo::PgMeterRepository;
pub use reading_repo::PgReadingRepository;

use meterbill_core::rules::ensure_no_dependents;
use meterbill_core::{AppError, AppResult, EntityKind};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, error};

/// Primary key column of the table holding `kind`
pub(crate) fn id_column(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Customer => "customer_id",
        EntityKind::Meter => "meter_id",
        EntityKind::Reading => "reading_id",
        EntityKind::Bill => "bill_id",
    }
}

pub(crate) async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin().await.map_err(|e| {
        error!("Failed to start transaction: {}", e);
        AppError::Transaction(format!("Failed to start transaction: {}", e))
    })
}

pub(crate) async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
    tx.commit().await.map_err(|e| {
        error!("Failed to commit transaction: {}", e);
        AppError::Transaction(format!("Failed to commit transaction: {}", e))
    })
}

/// Lock a referenced row against deletion for the rest of the transaction.
///
/// Fails with `InvalidReference` when the row does not exist.
pub(crate) async fn lock_reference(
    conn: &mut PgConnection,
    kind: EntityKind,
    id: i32,
) -> AppResult<()> {
    if lock_row(conn, kind, id, "FOR KEY SHARE").await? {
        Ok(())
    } else {
        Err(AppError::invalid_reference(kind, id))
    }
}

/// Lock a row that is about to be deleted; `NotFound` when it is absent.
pub(crate) async fn lock_for_delete(
    conn: &mut PgConnection,
    kind: EntityKind,
    id: i32,
) -> AppResult<()> {
    if lock_row(conn, kind, id, "FOR UPDATE").await? {
        Ok(())
    } else {
        Err(AppError::not_found(kind, id))
    }
}

async fn lock_row(
    conn: &mut PgConnection,
    kind: EntityKind,
    id: i32,
    mode: &str,
) -> AppResult<bool> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE {} = $1 {}",
        kind.plural(),
        id_column(kind),
        mode
    );

    let found: Option<i32> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            error!("Database error locking {} {}: {}", kind, id, e);
            AppError::Database(format!("Failed to lock {} {}: {}", kind, id, e))
        })?;

    Ok(found.is_some())
}

/// Refuse to delete `kind` `id` while any dependent row references it.
///
/// The caller must already hold the row lock from [`lock_for_delete`].
pub(crate) async fn ensure_deletable(
    conn: &mut PgConnection,
    kind: EntityKind,
    id: i32,
) -> AppResult<()> {
    for dependent in kind.dependents() {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            dependent.plural(),
            id_column(kind)
        );

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                error!("Database error counting {} of {} {}: {}", dependent.plural(), kind, id, e);
                AppError::Database(format!("Failed to count dependents: {}", e))
            })?;

        debug!("{} {} has {} {}", kind, id, count, dependent.plural());
        ensure_no_dependents(kind, id, *dependent, count)?;
    }
    Ok(())
}

/// Translate a failed INSERT or UPDATE into the matching domain error
pub(crate) fn map_write_error(e: sqlx::Error, context: &str) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::DuplicateKey(format!("{}: {}", context, db.message()));
        }
        if db.is_foreign_key_violation() {
            return AppError::InvalidReference(format!("{}: {}", context, db.message()));
        }
        // 22xxx: data exceptions (value too long, numeric overflow, ...)
        let data_exception = db.code().map_or(false, |code| code.starts_with("22"));
        if db.is_check_violation() || data_exception {
            return AppError::Validation(format!("{}: {}", context, db.message()));
        }
    }

    error!("{}: {}", context, e);
    AppError::Database(format!("{}: {}", context, e))
}

/// Translate a failed DELETE; a foreign key violation here means a
/// dependent slipped past the count.
pub(crate) fn map_delete_error(e: sqlx::Error, kind: EntityKind, id: i32) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_foreign_key_violation() {
            return AppError::Conflict(format!(
                "Cannot delete {} {}: still referenced",
                kind, id
            ));
        }
    }

    error!("Database error deleting {} {}: {}", kind, id, e);
    AppError::Database(format!("Failed to delete {}: {}", kind, e))
}
