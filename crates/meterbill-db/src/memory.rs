//! In-memory repositories
//!
//! Useful for testing and development. All four repositories share one
//! [`MemoryStore`]; every operation takes the store's lock once, so each
//! call sees and leaves a consistent state just like a committed
//! PostgreSQL transaction. Identities start at 1 and are never reused.

use meterbill_core::rules::ensure_no_dependents;
use meterbill_core::{
    models::{
        Bill, BillPatch, Customer, CustomerPatch, Meter, MeterDetail, MeterPatch, NewBill,
        NewCustomer, NewMeter, NewReading, Reading, ReadingPatch,
    },
    traits::{BillRepository, CustomerRepository, MeterRepository, ReadingRepository, Repository},
    AppError, AppResult, EntityKind,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Records and identity counters for every entity type
#[derive(Debug, Default)]
pub struct MemoryState {
    customers: BTreeMap<i32, Customer>,
    meters: BTreeMap<i32, Meter>,
    readings: BTreeMap<i32, Reading>,
    bills: BTreeMap<i32, Bill>,
    last_customer_id: i32,
    last_meter_id: i32,
    last_reading_id: i32,
    last_bill_id: i32,
}

fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

impl MemoryState {
    fn exists(&self, kind: EntityKind, id: i32) -> bool {
        match kind {
            EntityKind::Customer => self.customers.contains_key(&id),
            EntityKind::Meter => self.meters.contains_key(&id),
            EntityKind::Reading => self.readings.contains_key(&id),
            EntityKind::Bill => self.bills.contains_key(&id),
        }
    }

    fn require_reference(&self, kind: EntityKind, id: i32) -> AppResult<()> {
        if self.exists(kind, id) {
            Ok(())
        } else {
            Err(AppError::invalid_reference(kind, id))
        }
    }

    /// Number of `dependent` records that reference `kind` `id`
    fn count_dependents(&self, kind: EntityKind, id: i32, dependent: EntityKind) -> i64 {
        let count = match (kind, dependent) {
            (EntityKind::Customer, EntityKind::Meter) => {
                self.meters.values().filter(|m| m.customer_id == id).count()
            }
            (EntityKind::Customer, EntityKind::Bill) => {
                self.bills.values().filter(|b| b.customer_id == id).count()
            }
            (EntityKind::Meter, EntityKind::Reading) => {
                self.readings.values().filter(|r| r.meter_id == id).count()
            }
            (EntityKind::Reading, EntityKind::Bill) => self
                .bills
                .values()
                .filter(|b| b.reading_id == Some(id))
                .count(),
            _ => 0,
        };
        count as i64
    }

    fn ensure_deletable(&self, kind: EntityKind, id: i32) -> AppResult<()> {
        if !self.exists(kind, id) {
            return Err(AppError::not_found(kind, id));
        }
        for dependent in kind.dependents() {
            let count = self.count_dependents(kind, id, *dependent);
            ensure_no_dependents(kind, id, *dependent, count)?;
        }
        Ok(())
    }

    fn ensure_meter_number_free(&self, meter_number: &str, except: Option<i32>) -> AppResult<()> {
        let taken = self
            .meters
            .values()
            .any(|m| m.meter_number == meter_number && Some(m.meter_id) != except);
        if taken {
            return Err(AppError::DuplicateKey(format!(
                "Meter number {} already exists",
                meter_number
            )));
        }
        Ok(())
    }

    fn meter_detail(&self, meter: &Meter) -> MeterDetail {
        MeterDetail {
            meter: meter.clone(),
            customer_name: self
                .customers
                .get(&meter.customer_id)
                .map(|c| c.name.clone()),
        }
    }
}

/// Shared handle to the in-memory records
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|e| AppError::Internal(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|e| AppError::Internal(format!("Failed to acquire write lock: {}", e)))
    }
}

/// In-memory customer repository
#[derive(Debug, Clone)]
pub struct InMemoryCustomerRepository {
    store: MemoryStore,
}

impl InMemoryCustomerRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Repository<Customer, i32> for InMemoryCustomerRepository {
    type Create = NewCustomer;
    type Patch = CustomerPatch;

    async fn find_all(&self) -> AppResult<Vec<Customer>> {
        Ok(self.store.read()?.customers.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Customer>> {
        Ok(self.store.read()?.customers.get(&id).cloned())
    }

    async fn create(&self, input: NewCustomer) -> AppResult<Customer> {
        let mut state = self.store.write()?;
        let id = next_id(&mut state.last_customer_id);
        let customer = input.into_customer(id);
        state.customers.insert(id, customer.clone());

        info!("Created customer {}", id);
        Ok(customer)
    }

    async fn update(&self, id: i32, patch: CustomerPatch) -> AppResult<Customer> {
        let mut state = self.store.write()?;
        let customer = state
            .customers
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(EntityKind::Customer, id))?;
        patch.apply(customer);

        debug!("Updated customer {}", id);
        Ok(customer.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.store.write()?;
        state.ensure_deletable(EntityKind::Customer, id)?;
        state.customers.remove(&id);

        info!("Deleted customer {}", id);
        Ok(())
    }
}

impl CustomerRepository for InMemoryCustomerRepository {}

/// In-memory meter repository
#[derive(Debug, Clone)]
pub struct InMemoryMeterRepository {
    store: MemoryStore,
}

impl InMemoryMeterRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Repository<Meter, i32> for InMemoryMeterRepository {
    type Create = NewMeter;
    type Patch = MeterPatch;

    async fn find_all(&self) -> AppResult<Vec<Meter>> {
        Ok(self.store.read()?.meters.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Meter>> {
        Ok(self.store.read()?.meters.get(&id).cloned())
    }

    async fn create(&self, input: NewMeter) -> AppResult<Meter> {
        let mut state = self.store.write()?;
        state.require_reference(EntityKind::Customer, input.customer_id)?;
        state.ensure_meter_number_free(&input.meter_number, None)?;

        let id = next_id(&mut state.last_meter_id);
        let meter = input.into_meter(id);
        state.meters.insert(id, meter.clone());

        info!("Created meter {} for customer {}", id, meter.customer_id);
        Ok(meter)
    }

    async fn update(&self, id: i32, patch: MeterPatch) -> AppResult<Meter> {
        let mut state = self.store.write()?;
        let mut meter = state
            .meters
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(EntityKind::Meter, id))?;

        if let Some(customer_id) = patch.changed_customer(&meter) {
            state.require_reference(EntityKind::Customer, customer_id)?;
        }
        if let Some(meter_number) = &patch.meter_number {
            state.ensure_meter_number_free(meter_number, Some(id))?;
        }

        patch.apply(&mut meter);
        state.meters.insert(id, meter.clone());

        debug!("Updated meter {}", id);
        Ok(meter)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.store.write()?;
        state.ensure_deletable(EntityKind::Meter, id)?;
        state.meters.remove(&id);

        info!("Deleted meter {}", id);
        Ok(())
    }
}

#[async_trait]
impl MeterRepository for InMemoryMeterRepository {
    async fn find_all_detailed(&self) -> AppResult<Vec<MeterDetail>> {
        let state = self.store.read()?;
        Ok(state.meters.values().map(|m| state.meter_detail(m)).collect())
    }

    async fn find_detailed(&self, id: i32) -> AppResult<Option<MeterDetail>> {
        let state = self.store.read()?;
        Ok(state.meters.get(&id).map(|m| state.meter_detail(m)))
    }
}

/// In-memory reading repository
#[derive(Debug, Clone)]
pub struct InMemoryReadingRepository {
    store: MemoryStore,
}

impl InMemoryReadingRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Repository<Reading, i32> for InMemoryReadingRepository {
    type Create = NewReading;
    type Patch = ReadingPatch;

    async fn find_all(&self) -> AppResult<Vec<Reading>> {
        Ok(self.store.read()?.readings.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Reading>> {
        Ok(self.store.read()?.readings.get(&id).cloned())
    }

    async fn create(&self, input: NewReading) -> AppResult<Reading> {
        let mut state = self.store.write()?;
        state.require_reference(EntityKind::Meter, input.meter_id)?;

        let id = next_id(&mut state.last_reading_id);
        let reading = input.into_reading(id);
        state.readings.insert(id, reading.clone());

        info!("Recorded reading {} for meter {}", id, reading.meter_id);
        Ok(reading)
    }

    async fn update(&self, id: i32, patch: ReadingPatch) -> AppResult<Reading> {
        let mut state = self.store.write()?;
        let mut reading = state
            .readings
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(EntityKind::Reading, id))?;

        if let Some(meter_id) = patch.changed_meter(&reading) {
            state.require_reference(EntityKind::Meter, meter_id)?;
        }

        patch.apply(&mut reading);
        state.readings.insert(id, reading.clone());

        debug!("Updated reading {}", id);
        Ok(reading)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.store.write()?;
        state.ensure_deletable(EntityKind::Reading, id)?;
        state.readings.remove(&id);

        info!("Deleted reading {}", id);
        Ok(())
    }
}

impl ReadingRepository for InMemoryReadingRepository {}

/// In-memory bill repository
#[derive(Debug, Clone)]
pub struct InMemoryBillRepository {
    store: MemoryStore,
}

impl InMemoryBillRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Repository<Bill, i32> for InMemoryBillRepository {
    type Create = NewBill;
    type Patch = BillPatch;

    async fn find_all(&self) -> AppResult<Vec<Bill>> {
        Ok(self.store.read()?.bills.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Bill>> {
        Ok(self.store.read()?.bills.get(&id).cloned())
    }

    async fn create(&self, input: NewBill) -> AppResult<Bill> {
        let mut state = self.store.write()?;
        state.require_reference(EntityKind::Customer, input.customer_id)?;

        let reading = input
            .reading_id
            .and_then(|reading_id| state.readings.get(&reading_id).cloned());
        if let (Some(reading_id), None) = (input.reading_id, &reading) {
            warn!("Bill references unknown reading {}; nothing derived", reading_id);
        }

        let id = next_id(&mut state.last_bill_id);
        let bill = input
            .resolve(reading.as_ref(), Utc::now().date_naive())
            .into_bill(id);
        state.bills.insert(id, bill.clone());

        info!("Created bill {} for customer {}", id, bill.customer_id);
        Ok(bill)
    }

    async fn update(&self, id: i32, patch: BillPatch) -> AppResult<Bill> {
        let mut state = self.store.write()?;
        let mut bill = state
            .bills
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(EntityKind::Bill, id))?;

        if let Some(customer_id) = patch.changed_customer(&bill) {
            state.require_reference(EntityKind::Customer, customer_id)?;
        }

        patch.apply(&mut bill);
        state.bills.insert(id, bill.clone());

        debug!("Updated bill {}", id);
        Ok(bill)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.store.write()?;
        state
            .bills
            .remove(&id)
            .ok_or_else(|| AppError::not_found(EntityKind::Bill, id))?;

        info!("Deleted bill {}", id);
        Ok(())
    }
}

impl BillRepository for InMemoryBillRepository {}
