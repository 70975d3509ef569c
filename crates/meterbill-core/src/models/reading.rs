//! Reading model
//!
//! A reading records the units a meter consumed as of a date.

use super::{check_numeric, UNITS_NUMERIC};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Reading entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Unique identifier
    pub reading_id: i32,

    /// Meter the reading was taken from
    pub meter_id: i32,

    /// Date of the reading
    pub reading_date: NaiveDate,

    /// Units consumed, never negative
    #[serde(with = "rust_decimal::serde::float")]
    pub units_consumed: Decimal,
}

/// Input for recording a reading
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewReading {
    pub meter_id: i32,

    pub reading_date: NaiveDate,

    pub units_consumed: Decimal,
}

impl NewReading {
    /// Validate rules the derive cannot express
    pub fn validate_business_rules(&self) -> Result<(), String> {
        check_units(self.units_consumed)
    }

    /// Build the record that a store will persist under `reading_id`
    pub fn into_reading(self, reading_id: i32) -> Reading {
        Reading {
            reading_id,
            meter_id: self.meter_id,
            reading_date: self.reading_date,
            units_consumed: self.units_consumed,
        }
    }
}

/// Merge-patch for a reading
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReadingPatch {
    #[serde(default)]
    pub meter_id: Option<i32>,

    #[serde(default)]
    pub reading_date: Option<NaiveDate>,

    #[serde(default)]
    pub units_consumed: Option<Decimal>,
}

impl ReadingPatch {
    /// Validate rules the derive cannot express
    pub fn validate_business_rules(&self) -> Result<(), String> {
        match self.units_consumed {
            Some(units) => check_units(units),
            None => Ok(()),
        }
    }

    /// True when the request names no field at all
    pub fn is_empty(&self) -> bool {
        self.meter_id.is_none() && self.reading_date.is_none() && self.units_consumed.is_none()
    }

    /// The new meter, if the patch moves the reading to another meter
    pub fn changed_meter(&self, current: &Reading) -> Option<i32> {
        self.meter_id.filter(|id| *id != current.meter_id)
    }

    /// Overwrite the fields present in the patch
    pub fn apply(self, reading: &mut Reading) {
        if let Some(meter_id) = self.meter_id {
            reading.meter_id = meter_id;
        }
        if let Some(reading_date) = self.reading_date {
            reading.reading_date = reading_date;
        }
        if let Some(units_consumed) = self.units_consumed {
            reading.units_consumed = units_consumed;
        }
    }
}

fn check_units(units: Decimal) -> Result<(), String> {
    if units < Decimal::ZERO {
        return Err("units_consumed cannot be negative".to_string());
    }
    check_numeric("units_consumed", units, UNITS_NUMERIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_units_accept_number_or_string() {
        let from_number: NewReading = serde_json::from_value(json!({
            "meter_id": 1,
            "reading_date": "2024-10-01",
            "units_consumed": 300
        }))
        .unwrap();
        let from_string: NewReading = serde_json::from_value(json!({
            "meter_id": 1,
            "reading_date": "2024-10-01",
            "units_consumed": "300.5"
        }))
        .unwrap();

        assert_eq!(from_number.units_consumed, dec!(300));
        assert_eq!(from_string.units_consumed, dec!(300.5));
    }

    #[test]
    fn test_negative_units_rejected() {
        let input = NewReading {
            meter_id: 1,
            reading_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            units_consumed: dec!(-1),
        };
        assert!(input.validate_business_rules().is_err());

        let patch = ReadingPatch {
            units_consumed: Some(dec!(-0.5)),
            ..Default::default()
        };
        assert!(patch.validate_business_rules().is_err());
    }

    #[test]
    fn test_zero_units_allowed() {
        let input = NewReading {
            meter_id: 1,
            reading_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            units_consumed: dec!(0),
        };
        assert!(input.validate_business_rules().is_ok());
    }

    #[test]
    fn test_reading_serializes_units_as_number() {
        let reading = Reading {
            reading_id: 5,
            meter_id: 2,
            reading_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            units_consumed: dec!(300),
        };
        let value = serde_json::to_value(&reading).unwrap();

        assert_eq!(value["units_consumed"], json!(300.0));
        assert_eq!(value["reading_date"], "2024-10-01");
    }

    #[test]
    fn test_patch_apply() {
        let mut reading = Reading {
            reading_id: 5,
            meter_id: 2,
            reading_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            units_consumed: dec!(300),
        };
        let patch = ReadingPatch {
            units_consumed: Some(dec!(310)),
            ..Default::default()
        };
        assert_eq!(patch.changed_meter(&reading), None);
        patch.apply(&mut reading);

        assert_eq!(reading.units_consumed, dec!(310));
        assert_eq!(reading.meter_id, 2);
    }

    #[test]
    fn test_units_beyond_column_scale_rejected() {
        let input = NewReading {
            meter_id: 1,
            reading_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            units_consumed: dec!(300.0005),
        };
        assert!(input.validate_business_rules().is_err());

        let patch = ReadingPatch {
            units_consumed: Some(dec!(100000000000)),
            ..Default::default()
        };
        assert!(patch.validate_business_rules().is_err());
    }
}
