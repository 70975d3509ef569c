//! Reading repository implementation
//!
//! PostgreSQL-backed storage for meter readings.

use super::{
    begin, commit, ensure_deletable, lock_for_delete, lock_reference, map_delete_error,
    map_write_error,
};
use meterbill_core::{
    models::{NewReading, Reading, ReadingPatch},
    traits::{ReadingRepository, Repository},
    AppError, AppResult, EntityKind,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, error, info, instrument};

const READING_COLUMNS: &str = "reading_id, meter_id, reading_date, units_consumed";

/// PostgreSQL implementation of ReadingRepository
pub struct PgReadingRepository {
    pool: PgPool,
}

impl PgReadingRepository {
    /// Create a new reading repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Fetch a reading and hold it against deletion until the transaction ends.
///
/// Returns `None` for an unknown id; bills may keep such an id.
pub(crate) async fn find_and_share_lock(
    conn: &mut PgConnection,
    id: i32,
) -> AppResult<Option<Reading>> {
    let sql = format!(
        "SELECT {} FROM readings WHERE reading_id = $1 FOR KEY SHARE",
        READING_COLUMNS
    );
    let row = sqlx::query_as::<_, ReadingRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            error!("Database error locking reading {}: {}", id, e);
            AppError::Database(format!("Failed to find reading: {}", e))
        })?;

    Ok(row.map(Into::into))
}

#[async_trait]
impl Repository<Reading, i32> for PgReadingRepository {
    type Create = NewReading;
    type Patch = ReadingPatch;

    #[instrument(skip(self))]
    async fn find_all(&self) -> AppResult<Vec<Reading>> {
        let sql = format!("SELECT {} FROM readings ORDER BY reading_id", READING_COLUMNS);
        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing readings: {}", e);
                AppError::Database(format!("Failed to fetch readings: {}", e))
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Reading>> {
        debug!("Finding reading by id: {}", id);

        let sql = format!("SELECT {} FROM readings WHERE reading_id = $1", READING_COLUMNS);
        let row = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding reading {}: {}", id, e);
                AppError::Database(format!("Failed to find reading: {}", e))
            })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, input), fields(meter_id = input.meter_id))]
    async fn create(&self, input: NewReading) -> AppResult<Reading> {
        let mut tx = begin(&self.pool).await?;

        lock_reference(&mut tx, EntityKind::Meter, input.meter_id).await?;

        let sql = format!(
            "INSERT INTO readings (meter_id, reading_date, units_consumed) \
             VALUES ($1, $2, $3) RETURNING {}",
            READING_COLUMNS
        );
        let row = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(input.meter_id)
            .bind(input.reading_date)
            .bind(input.units_consumed)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Failed to create reading"))?;

        commit(tx).await?;

        info!("Recorded reading {} for meter {}", row.reading_id, row.meter_id);
        Ok(row.into())
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: i32, patch: ReadingPatch) -> AppResult<Reading> {
        let mut tx = begin(&self.pool).await?;

        let select = format!(
            "SELECT {} FROM readings WHERE reading_id = $1 FOR UPDATE",
            READING_COLUMNS
        );
        let mut reading: Reading = sqlx::query_as::<_, ReadingRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error locking reading {}: {}", id, e);
                AppError::Database(format!("Failed to find reading: {}", e))
            })?
            .ok_or_else(|| AppError::not_found(EntityKind::Reading, id))?
            .into();

        if let Some(meter_id) = patch.changed_meter(&reading) {
            lock_reference(&mut tx, EntityKind::Meter, meter_id).await?;
        }

        patch.apply(&mut reading);

        let update = format!(
            "UPDATE readings SET meter_id = $2, reading_date = $3, units_consumed = $4 \
             WHERE reading_id = $1 RETURNING {}",
            READING_COLUMNS
        );
        let row = sqlx::query_as::<_, ReadingRow>(&update)
            .bind(id)
            .bind(reading.meter_id)
            .bind(reading.reading_date)
            .bind(reading.units_consumed)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Failed to update reading"))?;

        commit(tx).await?;

        debug!("Updated reading {}", id);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = begin(&self.pool).await?;

        lock_for_delete(&mut tx, EntityKind::Reading, id).await?;
        ensure_deletable(&mut tx, EntityKind::Reading, id).await?;

        sqlx::query("DELETE FROM readings WHERE reading_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_delete_error(e, EntityKind::Reading, id))?;

        commit(tx).await?;

        info!("Deleted reading {}", id);
        Ok(())
    }
}

impl ReadingRepository for PgReadingRepository {}

/// Database row representation
#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    reading_id: i32,
    meter_id: i32,
    reading_date: NaiveDate,
    units_consumed: Decimal,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        Reading {
            reading_id: row.reading_id,
            meter_id: row.meter_id,
            reading_date: row.reading_date,
            units_consumed: row.units_consumed,
        }
    }
}
