// 🔍 Query - Aggregate reads over the loaded housing table
//
// Values are stored as text, so every comparison and aggregate casts first.
// Both reads return None when no row qualifies.

use crate::error::{EtlError, EtlResult};
use rusqlite::Connection;
use std::fmt;
use std::io::{BufRead, Write};

// ============================================================================
// PARAMETERS
// ============================================================================

/// Room count threshold, strictly exceeded by the rows it selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomThreshold(i64);

impl RoomThreshold {
    pub fn new(rooms: i64) -> EtlResult<Self> {
        if rooms < 0 {
            return Err(EtlError::InvalidInput {
                field: "room threshold",
                value: rooms.to_string(),
            });
        }
        Ok(RoomThreshold(rooms))
    }

    pub fn parse(input: &str) -> EtlResult<Self> {
        let rooms = input
            .trim()
            .parse::<i64>()
            .map_err(|_| EtlError::InvalidInput {
                field: "room threshold",
                value: input.trim().to_string(),
            })?;
        RoomThreshold::new(rooms)
    }

    pub fn rooms(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RoomThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Five-digit US ZIP code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipCode(String);

impl ZipCode {
    pub fn parse(input: &str) -> EtlResult<Self> {
        let zip = input.trim();
        if zip.len() != 5 || !zip.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EtlError::InvalidInput {
                field: "ZIP code",
                value: zip.to_string(),
            });
        }
        Ok(ZipCode(zip.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// Sum of total_bedrooms over rows with more than `threshold` rooms
pub fn total_bedrooms_above(conn: &Connection, threshold: RoomThreshold) -> EtlResult<Option<i64>> {
    let sum: Option<i64> = conn.query_row(
        "SELECT SUM(CAST(total_bedrooms AS INTEGER))
         FROM housing
         WHERE CAST(total_rooms AS INTEGER) > ?1",
        [threshold.rooms()],
        |row| row.get(0),
    )?;

    Ok(sum)
}

/// Rounded average median_income of the rows stored under `zip`
pub fn average_income_for_zip(conn: &Connection, zip: &ZipCode) -> EtlResult<Option<i64>> {
    let avg: Option<f64> = conn.query_row(
        "SELECT AVG(CAST(median_income AS REAL))
         FROM housing
         WHERE zip_code = ?1",
        [zip.as_str()],
        |row| row.get(0),
    )?;

    Ok(avg.map(|v| v.round() as i64))
}

/// 1234567 → "1,234,567"
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out
}

// ============================================================================
// INTERACTIVE VALIDATION
// ============================================================================

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> EtlResult<String> {
    write!(output, "{}", label)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line)
}

/// Ask for a room threshold and a ZIP code, answering each with one line.
///
/// Stops at the first invalid answer or failed query.
pub fn run_validation<R: BufRead, W: Write>(
    conn: &Connection,
    input: &mut R,
    output: &mut W,
) -> EtlResult<()> {
    let threshold = RoomThreshold::parse(&prompt(input, output, "Total rooms: ")?)?;
    match total_bedrooms_above(conn, threshold)? {
        Some(bedrooms) => writeln!(
            output,
            "For locations with more than {} rooms, there are a total of {} bedrooms.",
            threshold, bedrooms
        )?,
        None => writeln!(output, "No locations have more than {} rooms.", threshold)?,
    }
    writeln!(output)?;

    let zip = ZipCode::parse(&prompt(input, output, "ZIP Code: ")?)?;
    match average_income_for_zip(conn, &zip)? {
        Some(income) => writeln!(
            output,
            "The median household income for ZIP code {} is {}.",
            zip,
            format_thousands(income)
        )?,
        None => writeln!(output, "No records found for ZIP code {}.", zip)?,
    }

    Ok(())
}
