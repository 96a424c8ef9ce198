use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::Level;

use crate::loader::DataFiles;
use crate::pipeline::PipelineConfig;

pub const DEFAULT_DATA_DIR: &str = "db";
pub const DEFAULT_DATABASE: &str = "sales.sqlite";

/// Load the sales extracts into SQLite and print the standard reports.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Directory holding the CSV extracts.
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Customer dimension extract (defaults to customer_dim.csv in the data directory).
    #[arg(long)]
    pub customers: Option<PathBuf>,

    /// Product dimension extract (defaults to product_dim.csv in the data directory).
    #[arg(long)]
    pub products: Option<PathBuf>,

    /// Sales transactions extract (defaults to sales_transactions.csv in the data directory).
    #[arg(long)]
    pub transactions: Option<PathBuf>,

    /// SQLite database file (defaults to sales.sqlite in the data directory).
    #[arg(long, conflicts_with = "in_memory")]
    pub database: Option<PathBuf>,

    /// Keep the database in memory instead of on disk.
    #[arg(long)]
    pub in_memory: bool,

    /// Drop existing tables before loading.
    #[arg(long)]
    pub reset: bool,

    /// Skip the scripted inserts and delete.
    #[arg(long)]
    pub skip_demo: bool,

    /// Customer to delete after the demo inserts (defaults to the last demo customer).
    #[arg(long, value_name = "ID")]
    pub delete_customer: Option<i64>,

    /// Address fragment to look up instead of prompting.
    #[arg(long, value_name = "TEXT")]
    pub address: Option<String>,

    /// Never prompt for an address.
    #[arg(long)]
    pub no_prompt: bool,

    /// Number of customers in the spend ranking.
    #[arg(long, default_value_t = 5)]
    pub top: u32,

    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    /// `interactive` says whether stdin can answer the address prompt.
    pub fn into_pipeline_config(self, interactive: bool) -> PipelineConfig {
        let defaults = DataFiles::in_dir(&self.data_dir);
        let files = DataFiles {
            customers: self.customers.unwrap_or(defaults.customers),
            products: self.products.unwrap_or(defaults.products),
            transactions: self.transactions.unwrap_or(defaults.transactions),
        };
        let database = if self.in_memory {
            None
        } else {
            Some(
                self.database
                    .unwrap_or_else(|| self.data_dir.join(DEFAULT_DATABASE)),
            )
        };
        PipelineConfig {
            files,
            database,
            reset: self.reset,
            run_demo: !self.skip_demo,
            delete_customer: self.delete_customer,
            address: self.address,
            prompt: interactive && !self.no_prompt,
            top: self.top,
        }
    }
}
