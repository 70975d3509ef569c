//! Customer model
//!
//! Customers are the root of the ownership chain: meters and bills point at
//! them, nothing they hold points elsewhere.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Customer classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CustomerType {
    /// Household supply
    #[default]
    #[serde(alias = "residential", alias = "RESIDENTIAL")]
    Residential,
    /// Business supply
    #[serde(alias = "commercial", alias = "COMMERCIAL")]
    Commercial,
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerType::Residential => write!(f, "Residential"),
            CustomerType::Commercial => write!(f, "Commercial"),
        }
    }
}

impl CustomerType {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "residential" => Some(CustomerType::Residential),
            "commercial" => Some(CustomerType::Commercial),
            _ => None,
        }
    }
}

/// Customer entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Unique identifier
    pub customer_id: i32,

    /// Customer name
    pub name: String,

    /// Postal address
    pub address: Option<String>,

    /// Contact phone
    pub phone: Option<String>,

    /// Residential or commercial
    #[serde(rename = "type")]
    pub customer_type: CustomerType,
}

/// Input for creating a customer
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewCustomer {
    /// Customer name (`customer_name` accepted for older clients)
    #[serde(alias = "customer_name")]
    #[validate(length(min = 1, max = 100, message = "Customer name is required"))]
    pub name: String,

    #[validate(length(max = 200))]
    pub address: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    /// Defaults to Residential when omitted
    #[serde(rename = "type", default)]
    pub customer_type: Option<CustomerType>,
}

impl NewCustomer {
    /// Build the record that a store will persist under `customer_id`
    pub fn into_customer(self, customer_id: i32) -> Customer {
        Customer {
            customer_id,
            name: self.name,
            address: self.address,
            phone: self.phone,
            customer_type: self.customer_type.unwrap_or_default(),
        }
    }
}

/// Merge-patch for a customer
///
/// `address` and `phone` are nullable, so they carry two levels of `Option`:
/// absent leaves the value alone, `null` clears it.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CustomerPatch {
    #[serde(default, alias = "customer_name")]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    #[validate(length(max = 200))]
    pub address: Option<Option<String>>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    #[validate(length(max = 20))]
    pub phone: Option<Option<String>>,

    #[serde(default, rename = "type")]
    pub customer_type: Option<CustomerType>,
}

impl CustomerPatch {
    /// True when the request names no field at all
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.phone.is_none()
            && self.customer_type.is_none()
    }

    /// Overwrite the fields present in the patch
    pub fn apply(self, customer: &mut Customer) {
        if let Some(name) = self.name {
            customer.name = name;
        }
        if let Some(address) = self.address {
            customer.address = address;
        }
        if let Some(phone) = self.phone {
            customer.phone = phone;
        }
        if let Some(customer_type) = self.customer_type {
            customer.customer_type = customer_type;
        }
    }
}
