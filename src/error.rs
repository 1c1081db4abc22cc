use thiserror::Error;

use crate::db::RowFailure;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Table '{table}' has {len} rows, no row {row}")]
    RowOutOfRange { table: String, row: usize, len: usize },

    #[error("Invalid repair range [{lo}, {hi}): lower bound must be below upper bound")]
    InvalidRange { lo: i64, hi: i64 },

    #[error("Cannot align '{target}' with locality rows: expected {expected} rows, got {actual}")]
    RowCountMismatch {
        target: String,
        expected: usize,
        actual: usize,
    },

    #[error("Load rejected: {} rows failed, nothing committed", .failures.len())]
    LoadRejected { failures: Vec<RowFailure> },

    #[error("Invalid {field}: '{value}'")]
    InvalidInput { field: &'static str, value: String },
}

pub type EtlResult<T> = Result<T, EtlError>;
