// Housing ETL - Core Library
// Repairs the housing, income and ZIP datasets, joins them and loads SQLite

pub mod config;
pub mod db;
pub mod error;
pub mod join;
pub mod pipeline;
pub mod query;
pub mod repair;
pub mod table;
pub mod zip_repair;

// Re-export commonly used types
pub use config::Config;
pub use db::{load_records, open_database, setup_database, verify_count, LoadReport, RowFailure};
pub use error::{EtlError, EtlResult};
pub use join::{join_tables, JoinReport, MergedRecord, SINK_COLUMNS};
pub use pipeline::{CleaningReport, Datasets, PipelineOutput};
pub use query::{
    average_income_for_zip, format_thousands, run_validation, total_bedrooms_above,
    RoomThreshold, ZipCode,
};
pub use repair::{repair_column, ColumnRepair, RepairPlan, RepairRange, Substitution};
pub use table::Table;
pub use zip_repair::{
    propagate_zip_codes, repair_zip_codes, GoodZipLookup, Propagation, PropagationMode,
    ZipRepairReport, ZipTier,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
