use crate::error::{EtlError, EtlResult};
use crate::join::{MergedRecord, SINK_COLUMNS};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};

/// A merged record the sink refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    /// Position in the submitted batch
    pub row: usize,
    pub zip_code: String,
    pub error: String,
}

/// Audit entry for one committed load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub batch_id: String,
    pub loaded_at: DateTime<Utc>,
    pub rows_loaded: usize,
    /// Seed of the run that produced the rows, so the load can be replayed
    pub seed: Option<u64>,
}

impl LoadReport {
    pub fn new(rows_loaded: usize, seed: Option<u64>) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            loaded_at: Utc::now(),
            rows_loaded,
            seed,
        }
    }
}

pub fn open_database(path: &str) -> EtlResult<Connection> {
    let conn = Connection::open(path)?;
    log::info!("opened sink database at {}", path);
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> EtlResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Housing Table (every value stored as text)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS housing (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            zip_code TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            county TEXT NOT NULL,
            median_age TEXT NOT NULL,
            total_rooms TEXT NOT NULL,
            total_bedrooms TEXT NOT NULL,
            population TEXT NOT NULL,
            households TEXT NOT NULL,
            median_income TEXT NOT NULL,
            median_house_value TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Load Batches Table (one row per committed load)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS load_batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id TEXT UNIQUE NOT NULL,
            loaded_at TEXT NOT NULL,
            row_count INTEGER NOT NULL,
            seed TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_housing_zip ON housing(zip_code)",
        [],
    )?;

    Ok(())
}

fn insert_sql() -> String {
    let placeholders: Vec<String> = (1..=SINK_COLUMNS.len()).map(|n| format!("?{}", n)).collect();
    format!(
        "INSERT INTO housing ({}) VALUES ({})",
        SINK_COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

/// Load every merged record in one transaction.
///
/// All rows are attempted. If any of them fails the whole batch is rolled
/// back and every failure is returned in `EtlError::LoadRejected`.
pub fn load_records(
    conn: &mut Connection,
    records: &[MergedRecord],
    seed: Option<u64>,
) -> EtlResult<LoadReport> {
    let tx = conn.transaction()?;
    let mut failures = Vec::new();

    {
        let mut stmt = tx.prepare(&insert_sql())?;

        for (row, record) in records.iter().enumerate() {
            if let Err(e) = stmt.execute(params_from_iter(record.values())) {
                log::debug!("row {} ({}) rejected: {}", row, record.zip_code, e);
                failures.push(RowFailure {
                    row,
                    zip_code: record.zip_code.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    if !failures.is_empty() {
        tx.rollback()?;
        log::warn!(
            "load rolled back: {} of {} rows failed",
            failures.len(),
            records.len()
        );
        return Err(EtlError::LoadRejected { failures });
    }

    let report = LoadReport::new(records.len(), seed);
    tx.execute(
        "INSERT INTO load_batches (batch_id, loaded_at, row_count, seed)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            report.batch_id,
            report.loaded_at.to_rfc3339(),
            report.rows_loaded as i64,
            report.seed.map(|s| s.to_string()),
        ],
    )?;
    tx.commit()?;

    log::info!("batch {} committed {} rows", report.batch_id, report.rows_loaded);

    Ok(report)
}

pub fn verify_count(conn: &Connection) -> EtlResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM housing", [], |row| row.get(0))?;

    Ok(count)
}
