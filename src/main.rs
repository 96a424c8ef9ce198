use anyhow::Context;
use clap::Parser;
use std::io::{self, IsTerminal};
use tracing::info;

use sales_etl::config::Args;
use sales_etl::pipeline;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_writer(io::stderr)
        .init();

    let stdin = io::stdin();
    let config = args.into_pipeline_config(stdin.is_terminal());
    let mut input = stdin.lock();
    let mut output = io::stdout().lock();

    let summary = pipeline::run(&config, &mut input, &mut output).context("sales pipeline failed")?;
    info!(reports = summary.reports.len(), "done");
    Ok(())
}
