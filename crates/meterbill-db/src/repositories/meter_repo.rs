//! Meter repository implementation
//!
//! PostgreSQL-backed storage for meters. A meter must point at an existing
//! customer and its meter number is unique across all meters.

use super::{
    begin, commit, ensure_deletable, lock_for_delete, lock_reference, map_delete_error,
    map_write_error,
};
use meterbill_core::{
    models::{Meter, MeterDetail, MeterPatch, NewMeter},
    traits::{MeterRepository, Repository},
    AppError, AppResult, EntityKind,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument};

const METER_COLUMNS: &str = "meter_id, customer_id, meter_number, installation_date, status";

const DETAIL_SELECT: &str = r#"
    SELECT
        m.meter_id, m.customer_id, m.meter_number, m.installation_date, m.status,
        c.name AS customer_name
    FROM meters m
    LEFT JOIN customers c ON c.customer_id = m.customer_id
"#;

/// PostgreSQL implementation of MeterRepository
pub struct PgMeterRepository {
    pool: PgPool,
}

impl PgMeterRepository {
    /// Create a new meter repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Replace the generic unique-violation message with one naming the number
fn duplicate_number(err: AppError, meter_number: &str) -> AppError {
    match err {
        AppError::DuplicateKey(_) => {
            AppError::DuplicateKey(format!("Meter number {} already exists", meter_number))
        }
        other => other,
    }
}

#[async_trait]
impl Repository<Meter, i32> for PgMeterRepository {
    type Create = NewMeter;
    type Patch = MeterPatch;

    #[instrument(skip(self))]
    async fn find_all(&self) -> AppResult<Vec<Meter>> {
        let sql = format!("SELECT {} FROM meters ORDER BY meter_id", METER_COLUMNS);
        let rows = sqlx::query_as::<_, MeterRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing meters: {}", e);
                AppError::Database(format!("Failed to fetch meters: {}", e))
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Meter>> {
        debug!("Finding meter by id: {}", id);

        let sql = format!("SELECT {} FROM meters WHERE meter_id = $1", METER_COLUMNS);
        let row = sqlx::query_as::<_, MeterRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding meter {}: {}", id, e);
                AppError::Database(format!("Failed to find meter: {}", e))
            })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, input), fields(meter_number = %input.meter_number))]
    async fn create(&self, input: NewMeter) -> AppResult<Meter> {
        let mut tx = begin(&self.pool).await?;

        lock_reference(&mut tx, EntityKind::Customer, input.customer_id).await?;

        let meter = input.into_meter(0);
        let sql = format!(
            "INSERT INTO meters (customer_id, meter_number, installation_date, status) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            METER_COLUMNS
        );
        let row = sqlx::query_as::<_, MeterRow>(&sql)
            .bind(meter.customer_id)
            .bind(&meter.meter_number)
            .bind(meter.installation_date)
            .bind(&meter.status)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                duplicate_number(map_write_error(e, "Failed to create meter"), &meter.meter_number)
            })?;

        commit(tx).await?;

        info!("Created meter {} for customer {}", row.meter_id, row.customer_id);
        Ok(row.into())
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: i32, patch: MeterPatch) -> AppResult<Meter> {
        let mut tx = begin(&self.pool).await?;

        let select = format!("SELECT {} FROM meters WHERE meter_id = $1 FOR UPDATE", METER_COLUMNS);
        let mut meter: Meter = sqlx::query_as::<_, MeterRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error locking meter {}: {}", id, e);
                AppError::Database(format!("Failed to find meter: {}", e))
            })?
            .ok_or_else(|| AppError::not_found(EntityKind::Meter, id))?
            .into();

        if let Some(customer_id) = patch.changed_customer(&meter) {
            lock_reference(&mut tx, EntityKind::Customer, customer_id).await?;
        }

        patch.apply(&mut meter);

        let update = format!(
            "UPDATE meters SET customer_id = $2, meter_number = $3, installation_date = $4, \
             status = $5 WHERE meter_id = $1 RETURNING {}",
            METER_COLUMNS
        );
        let row = sqlx::query_as::<_, MeterRow>(&update)
            .bind(id)
            .bind(meter.customer_id)
            .bind(&meter.meter_number)
            .bind(meter.installation_date)
            .bind(&meter.status)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                duplicate_number(map_write_error(e, "Failed to update meter"), &meter.meter_number)
            })?;

        commit(tx).await?;

        debug!("Updated meter {}", id);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = begin(&self.pool).await?;

        lock_for_delete(&mut tx, EntityKind::Meter, id).await?;
        ensure_deletable(&mut tx, EntityKind::Meter, id).await?;

        sqlx::query("DELETE FROM meters WHERE meter_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_delete_error(e, EntityKind::Meter, id))?;

        commit(tx).await?;

        info!("Deleted meter {}", id);
        Ok(())
    }
}

#[async_trait]
impl MeterRepository for PgMeterRepository {
    #[instrument(skip(self))]
    async fn find_all_detailed(&self) -> AppResult<Vec<MeterDetail>> {
        let sql = format!("{} ORDER BY m.meter_id", DETAIL_SELECT);
        let rows = sqlx::query_as::<_, MeterDetailRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing meters: {}", e);
                AppError::Database(format!("Failed to fetch meters: {}", e))
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_detailed(&self, id: i32) -> AppResult<Option<MeterDetail>> {
        let sql = format!("{} WHERE m.meter_id = $1", DETAIL_SELECT);
        let row = sqlx::query_as::<_, MeterDetailRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding meter {}: {}", id, e);
                AppError::Database(format!("Failed to find meter: {}", e))
            })?;

        Ok(row.map(Into::into))
    }
}

/// Database row representation
#[derive(Debug, sqlx::FromRow)]
struct MeterRow {
    meter_id: i32,
    customer_id: i32,
    meter_number: String,
    installation_date: Option<NaiveDate>,
    status: String,
}

impl From<MeterRow> for Meter {
    fn from(row: MeterRow) -> Self {
        Meter {
            meter_id: row.meter_id,
            customer_id: row.customer_id,
            meter_number: row.meter_number,
            installation_date: row.installation_date,
            status: row.status,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MeterDetailRow {
    #[sqlx(flatten)]
    meter: MeterRow,
    customer_name: Option<String>,
}

impl From<MeterDetailRow> for MeterDetail {
    fn from(row: MeterDetailRow) -> Self {
        MeterDetail {
            meter: row.meter.into(),
            customer_name: row.customer_name,
        }
    }
}
