//! Bill repository implementation
//!
//! PostgreSQL-backed storage for bills. Creating a bill from a reading reads
//! that reading under a share lock, derives the missing fields and inserts
//! the bill in one transaction.

use super::reading_repo::find_and_share_lock;
use super::{begin, commit, lock_reference, map_write_error};
use meterbill_core::{
    models::{Bill, BillPatch, NewBill},
    traits::{BillRepository, Repository},
    AppError, AppResult, EntityKind,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};

const BILL_COLUMNS: &str =
    "bill_id, customer_id, billing_date, due_date, units, amount_due, status, reading_id";

/// PostgreSQL implementation of BillRepository
pub struct PgBillRepository {
    pool: PgPool,
}

impl PgBillRepository {
    /// Create a new bill repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Bill, i32> for PgBillRepository {
    type Create = NewBill;
    type Patch = BillPatch;

    #[instrument(skip(self))]
    async fn find_all(&self) -> AppResult<Vec<Bill>> {
        let sql = format!("SELECT {} FROM bills ORDER BY bill_id", BILL_COLUMNS);
        let rows = sqlx::query_as::<_, BillRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing bills: {}", e);
                AppError::Database(format!("Failed to fetch bills: {}", e))
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Bill>> {
        debug!("Finding bill by id: {}", id);

        let sql = format!("SELECT {} FROM bills WHERE bill_id = $1", BILL_COLUMNS);
        let row = sqlx::query_as::<_, BillRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding bill {}: {}", id, e);
                AppError::Database(format!("Failed to find bill: {}", e))
            })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, input), fields(customer_id = input.customer_id, reading_id = ?input.reading_id))]
    async fn create(&self, input: NewBill) -> AppResult<Bill> {
        let mut tx = begin(&self.pool).await?;

        lock_reference(&mut tx, EntityKind::Customer, input.customer_id).await?;

        let reading = match input.reading_id {
            Some(reading_id) => {
                let reading = find_and_share_lock(&mut tx, reading_id).await?;
                if reading.is_none() {
                    warn!("Bill references unknown reading {}; nothing derived", reading_id);
                }
                reading
            }
            None => None,
        };

        let bill = input.resolve(reading.as_ref(), Utc::now().date_naive());

        let sql = format!(
            "INSERT INTO bills (customer_id, billing_date, due_date, units, amount_due, status, reading_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            BILL_COLUMNS
        );
        let row = sqlx::query_as::<_, BillRow>(&sql)
            .bind(bill.customer_id)
            .bind(bill.billing_date)
            .bind(bill.due_date)
            .bind(bill.units)
            .bind(bill.amount_due)
            .bind(&bill.status)
            .bind(bill.reading_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Failed to create bill"))?;

        commit(tx).await?;

        info!("Created bill {} for customer {}", row.bill_id, row.customer_id);
        Ok(row.into())
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: i32, patch: BillPatch) -> AppResult<Bill> {
        let mut tx = begin(&self.pool).await?;

        let select = format!("SELECT {} FROM bills WHERE bill_id = $1 FOR UPDATE", BILL_COLUMNS);
        let mut bill: Bill = sqlx::query_as::<_, BillRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error locking bill {}: {}", id, e);
                AppError::Database(format!("Failed to find bill: {}", e))
            })?
            .ok_or_else(|| AppError::not_found(EntityKind::Bill, id))?
            .into();

        if let Some(customer_id) = patch.changed_customer(&bill) {
            lock_reference(&mut tx, EntityKind::Customer, customer_id).await?;
        }
        if let Some(reading_id) = patch.changed_reading(&bill) {
            // Held so the reading cannot be deleted under the new link
            find_and_share_lock(&mut tx, reading_id).await?;
        }

        patch.apply(&mut bill);

        let update = format!(
            "UPDATE bills SET customer_id = $2, billing_date = $3, due_date = $4, units = $5, \
             amount_due = $6, status = $7, reading_id = $8 WHERE bill_id = $1 RETURNING {}",
            BILL_COLUMNS
        );
        let row = sqlx::query_as::<_, BillRow>(&update)
            .bind(id)
            .bind(bill.customer_id)
            .bind(bill.billing_date)
            .bind(bill.due_date)
            .bind(bill.units)
            .bind(bill.amount_due)
            .bind(&bill.status)
            .bind(bill.reading_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Failed to update bill"))?;

        commit(tx).await?;

        debug!("Updated bill {}", id);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM bills WHERE bill_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error deleting bill {}: {}", id, e);
                AppError::Database(format!("Failed to delete bill: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(EntityKind::Bill, id));
        }

        info!("Deleted bill {}", id);
        Ok(())
    }
}

impl BillRepository for PgBillRepository {}

/// Database row representation
#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    bill_id: i32,
    customer_id: i32,
    billing_date: NaiveDate,
    due_date: NaiveDate,
    units: Decimal,
    amount_due: Decimal,
    status: String,
    reading_id: Option<i32>,
}

impl From<BillRow> for Bill {
    fn from(row: BillRow) -> Self {
        Bill {
            bill_id: row.bill_id,
            customer_id: row.customer_id,
            billing_date: row.billing_date,
            due_date: row.due_date,
            units: row.units,
            amount_due: row.amount_due,
            status: row.status,
            reading_id: row.reading_id,
        }
    }
}
