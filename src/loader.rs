use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{EtlError, Result};
use crate::model::{Customer, Product, Record, Transaction};
use crate::sqlite::SqliteStore;

pub const CUSTOMER_FILE: &str = "customer_dim.csv";
pub const PRODUCT_FILE: &str = "product_dim.csv";
pub const TRANSACTION_FILE: &str = "sales_transactions.csv";

/// Locations of the three extracts.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFiles {
    pub customers: PathBuf,
    pub products: PathBuf,
    pub transactions: PathBuf,
}

impl DataFiles {
    /// The standard file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            customers: dir.join(CUSTOMER_FILE),
            products: dir.join(PRODUCT_FILE),
            transactions: dir.join(TRANSACTION_FILE),
        }
    }
}

/// Row counts inserted per table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub customers: usize,
    pub products: usize,
    pub transactions: usize,
}

/// Read every row of a headerless extract into `T`.
pub fn read_records<T: Record>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|source| EtlError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(file);

    let mut records = Vec::new();
    for result in reader.deserialize::<T>() {
        let record = result.map_err(|source| EtlError::Record {
            path: path.to_path_buf(),
            line: source.position().map(|pos| pos.line()),
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Read an extract and bulk insert it into its table.
pub fn load_table<T: Record>(store: &mut SqliteStore, path: &Path) -> Result<usize> {
    let records = read_records::<T>(path)?;
    let inserted = store.insert_batch(T::TABLE, T::COLUMNS, records.iter().map(T::to_params))?;
    info!(table = T::TABLE, rows = inserted, "loaded {}", path.display());
    Ok(inserted)
}

/// Load the dimensions first, then the transactions that reference them.
pub fn load_all(store: &mut SqliteStore, files: &DataFiles) -> Result<LoadSummary> {
    Ok(LoadSummary {
        customers: load_table::<Customer>(store, &files.customers)?,
        products: load_table::<Product>(store, &files.products)?,
        transactions: load_table::<Transaction>(store, &files.transactions)?,
    })
}
