//! Sales extract loader and reporting for SQLite.
//!
//! # Intention
//!
//! - Load the customer, product and transaction extracts into one SQLite database.
//! - Run the scripted demo mutations, an address lookup and the fixed reports.
//!
//! # Architectural Boundaries
//!
//! - `sqlite` holds every piece of SQLite-specific code; other modules speak
//!   in `Value`, `Params` and CRUD operations.
//! - The binary only parses arguments and installs logging.

pub mod config;
pub mod demo;
pub mod error;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod reports;
pub mod schema;
pub mod sqlite;

pub use error::{EtlError, Result};
