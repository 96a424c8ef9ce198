use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::info;

use crate::demo::{run_demo, DemoOutcome};
use crate::error::Result;
use crate::loader::{load_all, DataFiles, LoadSummary};
use crate::reports::{lookup_by_address, prompt_address, render_table, run_reports, standard_reports};
use crate::schema::sales_schema;
use crate::sqlite::{QueryResult, SqliteConfig, SqliteStore};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub files: DataFiles,
    /// `None` keeps the database in memory.
    pub database: Option<PathBuf>,
    pub reset: bool,
    pub run_demo: bool,
    pub delete_customer: Option<i64>,
    /// Address fragment to look up; when absent and `prompt` is set, one is read from input.
    pub address: Option<String>,
    pub prompt: bool,
    pub top: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    pub loaded: LoadSummary,
    pub demo: Option<DemoOutcome>,
    pub lookup: Option<QueryResult>,
    pub reports: Vec<QueryResult>,
}

/// Load, mutate, look up and report, in that order, on one connection.
pub fn run<R: BufRead, W: Write>(
    config: &PipelineConfig,
    input: &mut R,
    output: &mut W,
) -> Result<PipelineSummary> {
    let sqlite = match &config.database {
        Some(path) => SqliteConfig::new(path, sales_schema()),
        None => SqliteConfig::in_memory(sales_schema()),
    };
    let mut store = SqliteStore::open(sqlite.with_reset(config.reset))?;
    store.initialize_schema()?;

    let loaded = load_all(&mut store, &config.files)?;
    info!(
        customers = loaded.customers,
        products = loaded.products,
        transactions = loaded.transactions,
        "extracts loaded"
    );

    let demo = if config.run_demo {
        Some(run_demo(&store, config.delete_customer)?)
    } else {
        None
    };

    let needle = match &config.address {
        Some(address) => Some(address.clone()),
        None if config.prompt => prompt_address(input, output)?,
        None => None,
    };
    let lookup = match needle {
        Some(needle) => {
            let found = lookup_by_address(&store, &needle)?;
            render_table(output, &format!("Customers with address matching {needle:?}"), &found)?;
            Some(found)
        }
        None => None,
    };

    let reports = run_reports(&store, &standard_reports(config.top), output)?;
    output.flush()?;

    Ok(PipelineSummary {
        loaded,
        demo,
        lookup,
        reports,
    })
}
