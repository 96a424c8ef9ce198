//! Row types for the three CSV extracts.
//!
//! The extracts carry no header line; fields are read by position in the
//! order the structs declare them.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;

use crate::error::{EtlError, Result};
use crate::sqlite::Params;

pub const CUSTOMERS: &str = "customers";
pub const PRODUCTS: &str = "products";
pub const TRANSACTIONS: &str = "transactions";

/// A CSV row that maps one-to-one onto a table.
pub trait Record: DeserializeOwned {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn to_params(&self) -> Params;
}

/// One version of a customer in the slowly changing customer dimension.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub address: String,
    pub age: Option<i64>,
    pub start_date: String,
    pub end_date: Option<String>,
    #[serde(deserialize_with = "deserialize_flag")]
    pub current: bool,
}

impl Record for Customer {
    const TABLE: &'static str = CUSTOMERS;
    const COLUMNS: &'static [&'static str] =
        &["ID", "address", "age", "start_date", "end_date", "current"];

    fn to_params(&self) -> Params {
        Params::new()
            .with_value("ID", self.id)
            .with_value("address", self.address.as_str())
            .with_value("age", self.age)
            .with_value("start_date", self.start_date.as_str())
            .with_value("end_date", self.end_date.clone())
            .with_value("current", self.current)
    }
}

/// One version of a product; `price` holds for `start_date..end_date`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub start_date: String,
    pub end_date: Option<String>,
    #[serde(deserialize_with = "deserialize_flag")]
    pub current: bool,
}

impl Record for Product {
    const TABLE: &'static str = PRODUCTS;
    const COLUMNS: &'static [&'static str] =
        &["ID", "name", "price", "start_date", "end_date", "current"];

    fn to_params(&self) -> Params {
        Params::new()
            .with_value("ID", self.id)
            .with_value("name", self.name.as_str())
            .with_value("price", self.price)
            .with_value("start_date", self.start_date.as_str())
            .with_value("end_date", self.end_date.clone())
            .with_value("current", self.current)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub product: i64,
    pub customer: i64,
    pub quantity: i64,
    pub order_date: String,
}

impl Record for Transaction {
    const TABLE: &'static str = TRANSACTIONS;
    const COLUMNS: &'static [&'static str] =
        &["ID", "product", "customer", "quantity", "order_date"];

    fn to_params(&self) -> Params {
        Params::new()
            .with_value("ID", self.id)
            .with_value("product", self.product)
            .with_value("customer", self.customer)
            .with_value("quantity", self.quantity)
            .with_value("order_date", self.order_date.as_str())
    }
}

/// Parse the `current` column of the dimension extracts.
pub fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Ok(true),
        "0" | "false" | "f" | "no" | "n" => Ok(false),
        _ => Err(EtlError::InvalidFlag(raw.to_string())),
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw).map_err(de::Error::custom)
}
