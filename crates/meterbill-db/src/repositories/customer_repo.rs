//! Customer repository implementation
//!
//! PostgreSQL-backed storage for customers. Customers reference nothing, so
//! writes only need to guard the row itself; deletes are refused while
//! meters or bills still point at the customer.

use super::{begin, commit, ensure_deletable, lock_for_delete, map_delete_error, map_write_error};
use meterbill_core::{
    models::{Customer, CustomerPatch, CustomerType, NewCustomer},
    traits::{CustomerRepository, Repository},
    AppError, AppResult, EntityKind,
};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument};

const CUSTOMER_COLUMNS: &str = "customer_id, name, address, phone, customer_type";

/// PostgreSQL implementation of CustomerRepository
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    /// Create a new customer repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Customer, i32> for PgCustomerRepository {
    type Create = NewCustomer;
    type Patch = CustomerPatch;

    #[instrument(skip(self))]
    async fn find_all(&self) -> AppResult<Vec<Customer>> {
        debug!("Listing customers");

        let sql = format!("SELECT {} FROM customers ORDER BY customer_id", CUSTOMER_COLUMNS);
        let rows = sqlx::query_as::<_, CustomerRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing customers: {}", e);
                AppError::Database(format!("Failed to fetch customers: {}", e))
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Customer>> {
        debug!("Finding customer by id: {}", id);

        let sql = format!("SELECT {} FROM customers WHERE customer_id = $1", CUSTOMER_COLUMNS);
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding customer {}: {}", id, e);
                AppError::Database(format!("Failed to find customer: {}", e))
            })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create(&self, input: NewCustomer) -> AppResult<Customer> {
        let customer_type = input.customer_type.unwrap_or_default();

        let sql = format!(
            "INSERT INTO customers (name, address, phone, customer_type) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            CUSTOMER_COLUMNS
        );
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(&input.name)
            .bind(&input.address)
            .bind(&input.phone)
            .bind(customer_type.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "Failed to create customer"))?;

        info!("Created customer {}", row.customer_id);
        Ok(row.into())
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: i32, patch: CustomerPatch) -> AppResult<Customer> {
        let mut tx = begin(&self.pool).await?;

        let select = format!(
            "SELECT {} FROM customers WHERE customer_id = $1 FOR UPDATE",
            CUSTOMER_COLUMNS
        );
        let mut customer: Customer = sqlx::query_as::<_, CustomerRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error locking customer {}: {}", id, e);
                AppError::Database(format!("Failed to find customer: {}", e))
            })?
            .ok_or_else(|| AppError::not_found(EntityKind::Customer, id))?
            .into();

        patch.apply(&mut customer);

        let update = format!(
            "UPDATE customers SET name = $2, address = $3, phone = $4, customer_type = $5 \
             WHERE customer_id = $1 RETURNING {}",
            CUSTOMER_COLUMNS
        );
        let row = sqlx::query_as::<_, CustomerRow>(&update)
            .bind(id)
            .bind(&customer.name)
            .bind(&customer.address)
            .bind(&customer.phone)
            .bind(customer.customer_type.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Failed to update customer"))?;

        commit(tx).await?;

        debug!("Updated customer {}", id);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = begin(&self.pool).await?;

        lock_for_delete(&mut tx, EntityKind::Customer, id).await?;
        ensure_deletable(&mut tx, EntityKind::Customer, id).await?;

        sqlx::query("DELETE FROM customers WHERE customer_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_delete_error(e, EntityKind::Customer, id))?;

        commit(tx).await?;

        info!("Deleted customer {}", id);
        Ok(())
    }
}

impl CustomerRepository for PgCustomerRepository {}

/// Database row representation
#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    customer_id: i32,
    name: String,
    address: Option<String>,
    phone: Option<String>,
    customer_type: String,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            customer_id: row.customer_id,
            name: row.name,
            address: row.address,
            phone: row.phone,
            customer_type: CustomerType::from_str(&row.customer_type).unwrap_or_default(),
        }
    }
}
