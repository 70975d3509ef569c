//! Meter model
//!
//! A meter belongs to exactly one customer and carries a globally unique
//! meter number.

use super::{lenient_date, lenient_date_patch};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Status assigned when the caller does not provide one
pub const DEFAULT_METER_STATUS: &str = "Active";

/// Meter entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meter {
    /// Unique identifier
    pub meter_id: i32,

    /// Owning customer
    pub customer_id: i32,

    /// Unique meter number printed on the device
    pub meter_number: String,

    /// Date the meter was installed, if known
    pub installation_date: Option<NaiveDate>,

    /// Free-form status ("Active", "Inactive", ...)
    pub status: String,
}

/// Meter joined with its owner's name, the shape of every meter response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterDetail {
    #[serde(flatten)]
    pub meter: Meter,

    /// `None` only if the owner vanished between reads
    pub customer_name: Option<String>,
}

/// Input for creating a meter
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewMeter {
    pub customer_id: i32,

    #[validate(length(min = 1, max = 50, message = "Meter number is required"))]
    pub meter_number: String,

    #[serde(default, deserialize_with = "lenient_date")]
    pub installation_date: Option<NaiveDate>,

    /// Defaults to "Active" when omitted
    #[validate(length(min = 1, max = 20))]
    pub status: Option<String>,
}

impl NewMeter {
    /// Build the record that a store will persist under `meter_id`
    pub fn into_meter(self, meter_id: i32) -> Meter {
        Meter {
            meter_id,
            customer_id: self.customer_id,
            meter_number: self.meter_number,
            installation_date: self.installation_date,
            status: self
                .status
                .unwrap_or_else(|| DEFAULT_METER_STATUS.to_string()),
        }
    }
}

/// Merge-patch for a meter
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MeterPatch {
    #[serde(default)]
    pub customer_id: Option<i32>,

    #[serde(default)]
    #[validate(length(min = 1, max = 50))]
    pub meter_number: Option<String>,

    #[serde(default, deserialize_with = "lenient_date_patch")]
    pub installation_date: Option<Option<NaiveDate>>,

    #[serde(default)]
    #[validate(length(min = 1, max = 20))]
    pub status: Option<String>,
}

impl MeterPatch {
    /// True when the request names no field at all
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.meter_number.is_none()
            && self.installation_date.is_none()
            && self.status.is_none()
    }

    /// The new owner, if the patch moves the meter to another customer
    pub fn changed_customer(&self, current: &Meter) -> Option<i32> {
        self.customer_id.filter(|id| *id != current.customer_id)
    }

    /// Overwrite the fields present in the patch
    pub fn apply(self, meter: &mut Meter) {
        if let Some(customer_id) = self.customer_id {
            meter.customer_id = customer_id;
        }
        if let Some(meter_number) = self.meter_number {
            meter.meter_number = meter_number;
        }
        if let Some(installation_date) = self.installation_date {
            meter.installation_date = installation_date;
        }
        if let Some(status) = self.status {
            meter.status = status;
        }
    }
}
