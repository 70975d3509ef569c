//! Embedded schema migrations
//!
//! The SQL files under `migrations/` are compiled into the binary with
//! `sqlx::migrate!` and applied in filename order. Applied versions are
//! recorded in `_sqlx_migrations`, so running this on every startup is safe.
//!
//! Never edit a migration that has shipped; add a new file instead.

use meterbill_core::AppResult;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

/// Migrations embedded from `crates/meterbill-db/migrations`
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply every pending migration
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    info!(
        "Running database migrations ({} embedded)",
        MIGRATOR.iter().count()
    );

    MIGRATOR.run(pool).await?;

    info!("Database schema is up to date");
    Ok(())
}
