//! Bill model
//!
//! Bills are the leaf of the ownership chain. When a bill is created from a
//! reading, its consumption and billing date are taken from that reading
//! unless the caller supplied them; the amount is always the caller's.

use super::{check_numeric, Reading, AMOUNT_NUMERIC, UNITS_NUMERIC};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Status assigned when the caller does not provide one
pub const DEFAULT_BILL_STATUS: &str = "Pending";

/// Bill entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    /// Unique identifier
    pub bill_id: i32,

    /// Billed customer
    pub customer_id: i32,

    pub billing_date: NaiveDate,

    pub due_date: NaiveDate,

    /// Units charged
    #[serde(with = "rust_decimal::serde::float")]
    pub units: Decimal,

    /// Amount owed, exactly as supplied by the caller
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_due: Decimal,

    /// Free-form status ("Pending", "Paid", "Overdue", ...)
    pub status: String,

    /// Reading the bill was raised from; stored as given
    pub reading_id: Option<i32>,
}

/// Input for creating a bill
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewBill {
    pub customer_id: i32,

    #[serde(default)]
    pub billing_date: Option<NaiveDate>,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub units: Option<Decimal>,

    pub amount_due: Decimal,

    #[serde(default)]
    #[validate(length(min = 1, max = 20))]
    pub status: Option<String>,

    #[serde(default)]
    pub reading_id: Option<i32>,
}

/// A bill with every default applied, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBill {
    pub customer_id: i32,
    pub billing_date: NaiveDate,
    pub due_date: NaiveDate,
    pub units: Decimal,
    pub amount_due: Decimal,
    pub status: String,
    pub reading_id: Option<i32>,
}

impl NewBill {
    /// Validate rules the derive cannot express
    pub fn validate_business_rules(&self) -> Result<(), String> {
        check_numeric("amount_due", self.amount_due, AMOUNT_NUMERIC)?;
        match self.units {
            Some(units) => check_numeric("units", units, UNITS_NUMERIC),
            None => Ok(()),
        }
    }

    /// Apply the derivation rules.
    ///
    /// `reading` is the row named by `reading_id`, or `None` when no reading
    /// was named or the named one does not exist. A dangling `reading_id` is
    /// kept on the bill.
    ///
    /// - `units`: caller's value, else the reading's consumption, else zero
    /// - `billing_date`: caller's value, else the reading's date, else `today`
    /// - `due_date`: caller's value, else `today`
    pub fn resolve(self, reading: Option<&Reading>, today: NaiveDate) -> ResolvedBill {
        let reading = reading.filter(|r| Some(r.reading_id) == self.reading_id);

        let units = self
            .units
            .or_else(|| reading.map(|r| r.units_consumed))
            .unwrap_or(Decimal::ZERO);
        let billing_date = self
            .billing_date
            .or_else(|| reading.map(|r| r.reading_date))
            .unwrap_or(today);
        // Not derived from billing_date: there is no grace period policy
        let due_date = self.due_date.unwrap_or(today);

        ResolvedBill {
            customer_id: self.customer_id,
            billing_date,
            due_date,
            units,
            amount_due: self.amount_due,
            status: self
                .status
                .unwrap_or_else(|| DEFAULT_BILL_STATUS.to_string()),
            reading_id: self.reading_id,
        }
    }
}

impl ResolvedBill {
    /// Attach the identity assigned by the store
    pub fn into_bill(self, bill_id: i32) -> Bill {
        Bill {
            bill_id,
            customer_id: self.customer_id,
            billing_date: self.billing_date,
            due_date: self.due_date,
            units: self.units,
            amount_due: self.amount_due,
            status: self.status,
            reading_id: self.reading_id,
        }
    }
}

/// Merge-patch for a bill
///
/// Patching never re-derives fields from a reading.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BillPatch {
    #[serde(default)]
    pub customer_id: Option<i32>,

    #[serde(default)]
    pub billing_date: Option<NaiveDate>,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub units: Option<Decimal>,

    #[serde(default)]
    pub amount_due: Option<Decimal>,

    #[serde(default)]
    #[validate(length(min = 1, max = 20))]
    pub status: Option<String>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub reading_id: Option<Option<i32>>,
}

impl BillPatch {
    /// Validate rules the derive cannot express
    pub fn validate_business_rules(&self) -> Result<(), String> {
        if let Some(amount_due) = self.amount_due {
            check_numeric("amount_due", amount_due, AMOUNT_NUMERIC)?;
        }
        if let Some(units) = self.units {
            check_numeric("units", units, UNITS_NUMERIC)?;
        }
        Ok(())
    }

    /// True when the request names no field at all
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.billing_date.is_none()
            && self.due_date.is_none()
            && self.units.is_none()
            && self.amount_due.is_none()
            && self.status.is_none()
            && self.reading_id.is_none()
    }

    /// The new customer, if the patch moves the bill to another customer
    pub fn changed_customer(&self, current: &Bill) -> Option<i32> {
        self.customer_id.filter(|id| *id != current.customer_id)
    }

    /// The newly linked reading, if the patch links a different one
    pub fn changed_reading(&self, current: &Bill) -> Option<i32> {
        match self.reading_id {
            Some(Some(id)) if current.reading_id != Some(id) => Some(id),
            _ => None,
        }
    }

    /// Overwrite the fields present in the patch
    pub fn apply(self, bill: &mut Bill) {
        if let Some(customer_id) = self.customer_id {
            bill.customer_id = customer_id;
        }
        if let Some(billing_date) = self.billing_date {
            bill.billing_date = billing_date;
        }
        if let Some(due_date) = self.due_date {
            bill.due_date = due_date;
        }
        if let Some(units) = self.units {
            bill.units = units;
        }
        if let Some(amount_due) = self.amount_due {
            bill.amount_due = amount_due;
        }
        if let Some(status) = self.status {
            bill.status = status;
        }
        if let Some(reading_id) = self.reading_id {
            bill.reading_id = reading_id;
        }
    }
}
