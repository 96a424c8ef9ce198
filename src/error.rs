use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading and reporting on the sales store.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("cannot open {}: {}", .path.display(), .source)]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad record in {}{}: {}", .path.display(), at_line(.line), .source)]
    Record {
        path: PathBuf,
        line: Option<u64>,
        #[source]
        source: csv::Error,
    },

    #[error("invalid flag value {0:?}")]
    InvalidFlag(String),

    #[error("no current product is available for demo orders")]
    NoCurrentProduct,

    #[error("operation on table {table} has no columns")]
    EmptyOperation { table: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;

fn at_line(line: &Option<u64>) -> String {
    line.map(|line| format!(" at line {line}")).unwrap_or_default()
}
