//! Domain models for MeterBill
//!
//! Each entity has three shapes: the persisted record, the input accepted by
//! `create` (optional fields left to the store's defaults), and a merge-patch
//! accepted by `update` where an absent field means "keep the stored value".

pub mod bill;
pub mod customer;
pub mod meter;
pub mod reading;

pub use bill::{Bill, BillPatch, NewBill, ResolvedBill, DEFAULT_BILL_STATUS};
pub use customer::{Customer, CustomerPatch, CustomerType, NewCustomer};
pub use meter::{Meter, MeterDetail, MeterPatch, NewMeter, DEFAULT_METER_STATUS};
pub use reading::{NewReading, Reading, ReadingPatch};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer};

/// Date format used on the wire
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// `(precision, scale)` of the `NUMERIC` columns holding consumption
pub const UNITS_NUMERIC: (u32, u32) = (14, 3);

/// `(precision, scale)` of the `NUMERIC` column holding money
pub const AMOUNT_NUMERIC: (u32, u32) = (12, 2);

/// Reject a value the `NUMERIC(precision, scale)` column would round or
/// overflow, so every backend stores exactly what the caller sent.
pub(crate) fn check_numeric(
    field: &str,
    value: Decimal,
    (precision, scale): (u32, u32),
) -> Result<(), String> {
    if value.normalize().scale() > scale {
        return Err(format!(
            "{} allows at most {} decimal places",
            field, scale
        ));
    }
    let limit = Decimal::from(10_i64.pow(precision - scale));
    if value.abs() >= limit {
        return Err(format!("{} must be below {}", field, limit));
    }
    Ok(())
}

/// Deserialize an optional ISO date, treating `null` and `""` as absent.
///
/// Form-driven clients send an empty string for an untouched date input.
pub(crate) fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map(Some)
            .map_err(de::Error::custom),
    }
}

/// Patch flavour of [`lenient_date`]: only called when the field is present,
/// so the outer `Some` records "the caller touched this field".
pub(crate) fn lenient_date_patch<'de, D>(
    deserializer: D,
) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_date(deserializer).map(Some)
}
