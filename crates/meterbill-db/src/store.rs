//! Entity store
//!
//! [`EntityStore`] is the single handle the API layer talks to. It validates
//! input, delegates to the configured repositories and turns missing records
//! into [`AppError::NotFound`]. It is built once at startup and cloned into
//! every worker.

use crate::memory::{
    InMemoryBillRepository, InMemoryCustomerRepository, InMemoryMeterRepository,
    InMemoryReadingRepository, MemoryStore,
};
use crate::repositories::{
    PgBillRepository, PgCustomerRepository, PgMeterRepository, PgReadingRepository,
};
use meterbill_core::{
    models::{
        Bill, BillPatch, Customer, CustomerPatch, Meter, MeterDetail, MeterPatch, NewBill,
        NewCustomer, NewMeter, NewReading, Reading, ReadingPatch,
    },
    traits::{BillRepository, CustomerRepository, MeterRepository, ReadingRepository},
    AppError, AppResult, EntityKind,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, warn};
use validator::Validate;

/// Shared access to customers, meters, readings and bills
#[derive(Clone)]
pub struct EntityStore {
    customers: Arc<dyn CustomerRepository>,
    meters: Arc<dyn MeterRepository>,
    readings: Arc<dyn ReadingRepository>,
    bills: Arc<dyn BillRepository>,
}

fn found<T>(record: Option<T>, kind: EntityKind, id: i32) -> AppResult<T> {
    record.ok_or_else(|| AppError::not_found(kind, id))
}

/// Run derive-based validation, logging what was rejected
fn check<T: Validate>(input: &T, kind: EntityKind) -> AppResult<()> {
    input.validate().map_err(|e| {
        warn!("Rejected {} input: {}", kind, e);
        AppError::from(e)
    })
}

fn log_noop(is_empty: bool, kind: EntityKind, id: i32) {
    if is_empty {
        debug!("Update of {} {} names no fields", kind, id);
    }
}

fn check_rules(result: Result<(), String>, kind: EntityKind) -> AppResult<()> {
    result.map_err(|msg| {
        warn!("Rejected {} input: {}", kind, msg);
        AppError::Validation(msg)
    })
}

impl EntityStore {
    /// Build a store from explicit repositories
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        meters: Arc<dyn MeterRepository>,
        readings: Arc<dyn ReadingRepository>,
        bills: Arc<dyn BillRepository>,
    ) -> Self {
        Self {
            customers,
            meters,
            readings,
            bills,
        }
    }

    /// Store backed by PostgreSQL
    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            Arc::new(PgCustomerRepository::new(pool.clone())),
            Arc::new(PgMeterRepository::new(pool.clone())),
            Arc::new(PgReadingRepository::new(pool.clone())),
            Arc::new(PgBillRepository::new(pool)),
        )
    }

    /// Empty store kept in process memory
    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        Self::new(
            Arc::new(InMemoryCustomerRepository::new(store.clone())),
            Arc::new(InMemoryMeterRepository::new(store.clone())),
            Arc::new(InMemoryReadingRepository::new(store.clone())),
            Arc::new(InMemoryBillRepository::new(store)),
        )
    }

    // ==================== Customers ====================

    pub async fn list_customers(&self) -> AppResult<Vec<Customer>> {
        self.customers.find_all().await
    }

    pub async fn get_customer(&self, id: i32) -> AppResult<Customer> {
        found(self.customers.find_by_id(id).await?, EntityKind::Customer, id)
    }

    pub async fn create_customer(&self, input: NewCustomer) -> AppResult<Customer> {
        check(&input, EntityKind::Customer)?;
        self.customers.create(input).await
    }

    pub async fn update_customer(&self, id: i32, patch: CustomerPatch) -> AppResult<Customer> {
        check(&patch, EntityKind::Customer)?;
        log_noop(patch.is_empty(), EntityKind::Customer, id);
        self.customers.update(id, patch).await
    }

    pub async fn delete_customer(&self, id: i32) -> AppResult<()> {
        self.customers.delete(id).await
    }

    // ==================== Meters ====================

    pub async fn list_meters(&self) -> AppResult<Vec<Meter>> {
        self.meters.find_all().await
    }

    /// Meters with their owner's name
    pub async fn list_meter_details(&self) -> AppResult<Vec<MeterDetail>> {
        self.meters.find_all_detailed().await
    }

    pub async fn get_meter(&self, id: i32) -> AppResult<Meter> {
        found(self.meters.find_by_id(id).await?, EntityKind::Meter, id)
    }

    pub async fn get_meter_detail(&self, id: i32) -> AppResult<MeterDetail> {
        found(self.meters.find_detailed(id).await?, EntityKind::Meter, id)
    }

    /// Attach the owner's name to a meter that was just written
    pub async fn describe_meter(&self, meter: Meter) -> AppResult<MeterDetail> {
        let customer_name = self
            .customers
            .find_by_id(meter.customer_id)
            .await?
            .map(|c| c.name);
        Ok(MeterDetail {
            meter,
            customer_name,
        })
    }

    pub async fn create_meter(&self, input: NewMeter) -> AppResult<Meter> {
        check(&input, EntityKind::Meter)?;
        self.meters.create(input).await
    }

    pub async fn update_meter(&self, id: i32, patch: MeterPatch) -> AppResult<Meter> {
        check(&patch, EntityKind::Meter)?;
        log_noop(patch.is_empty(), EntityKind::Meter, id);
        self.meters.update(id, patch).await
    }

    pub async fn delete_meter(&self, id: i32) -> AppResult<()> {
        self.meters.delete(id).await
    }

    // ==================== Readings ====================

    pub async fn list_readings(&self) -> AppResult<Vec<Reading>> {
        self.readings.find_all().await
    }

    pub async fn get_reading(&self, id: i32) -> AppResult<Reading> {
        found(self.readings.find_by_id(id).await?, EntityKind::Reading, id)
    }

    pub async fn create_reading(&self, input: NewReading) -> AppResult<Reading> {
        check(&input, EntityKind::Reading)?;
        check_rules(input.validate_business_rules(), EntityKind::Reading)?;
        self.readings.create(input).await
    }

    pub async fn update_reading(&self, id: i32, patch: ReadingPatch) -> AppResult<Reading> {
        check(&patch, EntityKind::Reading)?;
        log_noop(patch.is_empty(), EntityKind::Reading, id);
        check_rules(patch.validate_business_rules(), EntityKind::Reading)?;
        self.readings.update(id, patch).await
    }

    pub async fn delete_reading(&self, id: i32) -> AppResult<()> {
        self.readings.delete(id).await
    }

    // ==================== Bills ====================

    pub async fn list_bills(&self) -> AppResult<Vec<Bill>> {
        self.bills.find_all().await
    }

    pub async fn get_bill(&self, id: i32) -> AppResult<Bill> {
        found(self.bills.find_by_id(id).await?, EntityKind::Bill, id)
    }

    /// Create a bill, deriving units and billing date from the linked
    /// reading when the caller left them out
    pub async fn create_bill(&self, input: NewBill) -> AppResult<Bill> {
        check(&input, EntityKind::Bill)?;
        check_rules(input.validate_business_rules(), EntityKind::Bill)?;
        self.bills.create(input).await
    }

    pub async fn update_bill(&self, id: i32, patch: BillPatch) -> AppResult<Bill> {
        check(&patch, EntityKind::Bill)?;
        log_noop(patch.is_empty(), EntityKind::Bill, id);
        check_rules(patch.validate_business_rules(), EntityKind::Bill)?;
        self.bills.update(id, patch).await
    }

    pub async fn delete_bill(&self, id: i32) -> AppResult<()> {
        self.bills.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed_customer(store: &EntityStore, name: &str) -> Customer {
        store
            .create_customer(NewCustomer {
                name: name.to_string(),
                address: Some("12 High St".to_string()),
                phone: Some("555-0100".to_string()),
                customer_type: None,
            })
            .await
            .unwrap()
    }

    async fn seed_meter(store: &EntityStore, customer_id: i32, number: &str) -> Meter {
        store
            .create_meter(NewMeter {
                customer_id,
                meter_number: number.to_string(),
                installation_date: Some(date(2023, 5, 14)),
                status: None,
            })
            .await
            .unwrap()
    }

    async fn seed_reading(store: &EntityStore, meter_id: i32) -> Reading {
        store
            .create_reading(NewReading {
                meter_id,
                reading_date: date(2024, 10, 1),
                units_consumed: dec!(300),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;
        let reading = seed_reading(&store, meter.meter_id).await;

        assert_eq!(store.get_customer(customer.customer_id).await.unwrap(), customer);
        assert_eq!(store.get_meter(meter.meter_id).await.unwrap(), meter);
        assert_eq!(store.get_reading(reading.reading_id).await.unwrap(), reading);
        assert_eq!(meter.status, "Active");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = EntityStore::in_memory();
        assert!(matches!(store.get_customer(1).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.get_meter_detail(1).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.get_bill(1).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_customer_delete_blocked_by_meter() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;

        let blocked = store.delete_customer(customer.customer_id).await;
        assert!(matches!(blocked, Err(AppError::Conflict(_))));
        assert!(store.get_customer(customer.customer_id).await.is_ok());

        store.delete_meter(meter.meter_id).await.unwrap();
        store.delete_customer(customer.customer_id).await.unwrap();
        assert!(matches!(
            store.get_customer(customer.customer_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_customer_delete_blocked_by_bill() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        store
            .create_bill(NewBill {
                customer_id: customer.customer_id,
                amount_due: dec!(10),
                ..Default::default()
            })
            .await
            .unwrap();

        let blocked = store.delete_customer(customer.customer_id).await;
        assert!(matches!(blocked, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_meter_delete_blocked_by_reading() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;
        let reading = seed_reading(&store, meter.meter_id).await;

        assert!(matches!(
            store.delete_meter(meter.meter_id).await,
            Err(AppError::Conflict(_))
        ));

        store.delete_reading(reading.reading_id).await.unwrap();
        store.delete_meter(meter.meter_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_reading_delete_blocked_by_bill() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;
        let reading = seed_reading(&store, meter.meter_id).await;
        let bill = store
            .create_bill(NewBill {
                customer_id: customer.customer_id,
                reading_id: Some(reading.reading_id),
                amount_due: dec!(36.0),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(matches!(
            store.delete_reading(reading.reading_id).await,
            Err(AppError::Conflict(_))
        ));

        store.delete_bill(bill.bill_id).await.unwrap();
        store.delete_reading(reading.reading_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_unlinking_bill_releases_reading() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;
        let reading = seed_reading(&store, meter.meter_id).await;
        let bill = store
            .create_bill(NewBill {
                customer_id: customer.customer_id,
                reading_id: Some(reading.reading_id),
                amount_due: dec!(36.0),
                ..Default::default()
            })
            .await
            .unwrap();

        let unlink = BillPatch {
            reading_id: Some(None),
            ..Default::default()
        };
        let updated = store.update_bill(bill.bill_id, unlink).await.unwrap();
        assert_eq!(updated.reading_id, None);
        assert_eq!(updated.units, dec!(300));

        store.delete_reading(reading.reading_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_meter_number() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        seed_meter(&store, customer.customer_id, "MTR-001").await;

        let second = store
            .create_meter(NewMeter {
                customer_id: customer.customer_id,
                meter_number: "MTR-001".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(second, Err(AppError::DuplicateKey(_))));
        assert_eq!(store.list_meters().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_renumbering_onto_existing_meter_is_duplicate() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        seed_meter(&store, customer.customer_id, "MTR-001").await;
        let other = seed_meter(&store, customer.customer_id, "MTR-002").await;

        let patch = MeterPatch {
            meter_number: Some("MTR-001".to_string()),
            ..Default::default()
        };
        let result = store.update_meter(other.meter_id, patch).await;
        assert!(matches!(result, Err(AppError::DuplicateKey(_))));
        assert_eq!(
            store.get_meter(other.meter_id).await.unwrap().meter_number,
            "MTR-002"
        );
    }

    #[tokio::test]
    async fn test_bill_derived_from_reading() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;
        let reading = seed_reading(&store, meter.meter_id).await;

        let bill = store
            .create_bill(NewBill {
                customer_id: customer.customer_id,
                reading_id: Some(reading.reading_id),
                amount_due: dec!(36.0),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(bill.units, dec!(300));
        assert_eq!(bill.billing_date, date(2024, 10, 1));
        assert_eq!(bill.amount_due, dec!(36.0));
        assert_eq!(bill.status, "Pending");
        assert_eq!(bill.reading_id, Some(reading.reading_id));
        assert_eq!(store.get_bill(bill.bill_id).await.unwrap(), bill);
    }

    #[tokio::test]
    async fn test_update_changes_only_named_field() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;

        let patch = CustomerPatch {
            address: Some(Some("New Address".to_string())),
            ..Default::default()
        };
        let updated = store.update_customer(customer.customer_id, patch).await.unwrap();

        assert_eq!(updated.address.as_deref(), Some("New Address"));
        assert_eq!(updated.name, customer.name);
        assert_eq!(updated.phone, customer.phone);
        assert_eq!(updated.customer_type, customer.customer_type);
    }

    #[tokio::test]
    async fn test_meter_for_unknown_customer_is_invalid_reference() {
        let store = EntityStore::in_memory();

        let result = store
            .create_meter(NewMeter {
                customer_id: 999,
                meter_number: "X".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(AppError::InvalidReference(_))));
        assert!(store.list_meters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_moving_reading_to_unknown_meter_is_invalid_reference() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;
        let reading = seed_reading(&store, meter.meter_id).await;

        let patch = ReadingPatch {
            meter_id: Some(77),
            ..Default::default()
        };
        let result = store.update_reading(reading.reading_id, patch).await;
        assert!(matches!(result, Err(AppError::InvalidReference(_))));
        assert_eq!(store.get_reading(reading.reading_id).await.unwrap(), reading);
    }

    #[tokio::test]
    async fn test_validation_rejected_before_write() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;

        let negative = store
            .create_reading(NewReading {
                meter_id: meter.meter_id,
                reading_date: date(2024, 10, 1),
                units_consumed: dec!(-5),
            })
            .await;
        assert!(matches!(negative, Err(AppError::Validation(_))));

        let unnamed = store.create_customer(NewCustomer::default()).await;
        assert!(matches!(unnamed, Err(AppError::Validation(_))));

        assert!(store.list_readings().await.unwrap().is_empty());
        assert_eq!(store.list_customers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = EntityStore::in_memory();
        let result = store.update_bill(5, BillPatch::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(matches!(store.delete_bill(5).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.delete_customer(5).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_meter_details_list_owner_names() {
        let store = EntityStore::in_memory();
        let a = seed_customer(&store, "Alice").await;
        let b = seed_customer(&store, "Bob").await;
        seed_meter(&store, a.customer_id, "MTR-A").await;
        seed_meter(&store, b.customer_id, "MTR-B").await;

        let details = store.list_meter_details().await.unwrap();
        let names: Vec<_> = details
            .iter()
            .map(|d| d.customer_name.clone().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn test_patch_longer_than_column_is_rejected() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;

        let patch = CustomerPatch {
            address: Some(Some("x".repeat(300))),
            ..Default::default()
        };
        let result = store.update_customer(customer.customer_id, patch).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let patch = CustomerPatch {
            phone: Some(Some("5".repeat(50))),
            ..Default::default()
        };
        let result = store.update_customer(customer.customer_id, patch).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        assert_eq!(store.get_customer(customer.customer_id).await.unwrap(), customer);
    }

    #[tokio::test]
    async fn test_amount_finer_than_a_cent_is_rejected() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;

        let result = store
            .create_bill(NewBill {
                customer_id: customer.customer_id,
                amount_due: dec!(36.005),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(store.list_bills().await.unwrap().is_empty());

        let bill = store
            .create_bill(NewBill {
                customer_id: customer.customer_id,
                amount_due: dec!(36.01),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(bill.amount_due, dec!(36.01));

        let patch = BillPatch {
            units: Some(dec!(1.0001)),
            ..Default::default()
        };
        let result = store.update_bill(bill.bill_id, patch).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.get_bill(bill.bill_id).await.unwrap(), bill);
    }

    #[tokio::test]
    async fn test_moving_meter_to_unknown_customer_is_invalid_reference() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;

        let patch = MeterPatch {
            customer_id: Some(999),
            ..Default::default()
        };
        let result = store.update_meter(meter.meter_id, patch).await;
        assert!(matches!(result, Err(AppError::InvalidReference(_))));
        assert_eq!(store.get_meter(meter.meter_id).await.unwrap(), meter);

        let other = seed_customer(&store, "Jane Doe").await;
        let patch = MeterPatch {
            customer_id: Some(other.customer_id),
            ..Default::default()
        };
        let moved = store.update_meter(meter.meter_id, patch).await.unwrap();
        assert_eq!(moved.customer_id, other.customer_id);
    }

    #[tokio::test]
    async fn test_moving_bill_to_unknown_customer_is_invalid_reference() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let bill = store
            .create_bill(NewBill {
                customer_id: customer.customer_id,
                amount_due: dec!(12.50),
                ..Default::default()
            })
            .await
            .unwrap();

        let patch = BillPatch {
            customer_id: Some(999),
            status: Some("Paid".to_string()),
            ..Default::default()
        };
        let result = store.update_bill(bill.bill_id, patch).await;
        assert!(matches!(result, Err(AppError::InvalidReference(_))));
        assert_eq!(store.get_bill(bill.bill_id).await.unwrap(), bill);
    }

    #[tokio::test]
    async fn test_empty_patch_leaves_record_unchanged() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;

        assert!(MeterPatch::default().is_empty());
        let same = store.update_meter(meter.meter_id, MeterPatch::default()).await.unwrap();
        assert_eq!(same, meter);

        let result = store.update_meter(404, MeterPatch::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_describe_meter_names_owner() {
        let store = EntityStore::in_memory();
        let customer = seed_customer(&store, "John Smith").await;
        let meter = seed_meter(&store, customer.customer_id, "MTR-001").await;

        let detail = store.describe_meter(meter.clone()).await.unwrap();
        assert_eq!(detail.meter, meter);
        assert_eq!(detail.customer_name.as_deref(), Some("John Smith"));
    }
}
