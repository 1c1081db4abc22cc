// 🩹 Column Repair - Replace corruption markers with in-range random values
//
// A corrupted cell ends in four uppercase letters ("12ABCD", "WXYZ"). The
// marker is swapped for a random integer drawn from the column's range; any
// prefix in front of the marker stays where it is.

use crate::error::{EtlError, EtlResult};
use crate::table::Table;
use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};

static CORRUPT_SUFFIX: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"[A-Z]{4}$").expect("corruption suffix pattern is valid"));

/// Byte offset where the corruption marker starts, if the value has one
pub fn corrupt_suffix_start(value: &str) -> Option<usize> {
    CORRUPT_SUFFIX.find(value).map(|m| m.start())
}

// ============================================================================
// RANGES & MODES
// ============================================================================

/// Half-open integer range `[lo, hi)`. Never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(i64, i64)", into = "(i64, i64)")]
pub struct RepairRange {
    lo: i64,
    hi: i64,
}

impl RepairRange {
    pub fn new(lo: i64, hi: i64) -> EtlResult<Self> {
        if lo >= hi {
            return Err(EtlError::InvalidRange { lo, hi });
        }
        Ok(RepairRange { lo, hi })
    }

    pub fn lo(&self) -> i64 {
        self.lo
    }

    pub fn hi(&self) -> i64 {
        self.hi
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.lo && value < self.hi
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        rng.gen_range(self.lo..self.hi)
    }
}

impl TryFrom<(i64, i64)> for RepairRange {
    type Error = EtlError;

    fn try_from((lo, hi): (i64, i64)) -> EtlResult<Self> {
        RepairRange::new(lo, hi)
    }
}

impl From<RepairRange> for (i64, i64) {
    fn from(range: RepairRange) -> Self {
        (range.lo, range.hi)
    }
}

/// How a drawn replacement is applied to the column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Substitution {
    /// Every corrupted cell gets its own draw
    #[default]
    PerRow,

    /// One draw per distinct corrupted value; every cell holding that value
    /// receives the same replacement
    ByValue,
}

// ============================================================================
// REPAIR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRepair {
    pub table: String,
    pub column: String,
    pub repaired: usize,
}

pub fn repair_column<R: Rng + ?Sized>(
    table: &mut Table,
    column: &str,
    range: RepairRange,
    substitution: Substitution,
    rng: &mut R,
) -> EtlResult<ColumnRepair> {
    let repaired = match substitution {
        Substitution::PerRow => repair_per_row(table, column, range, rng)?,
        Substitution::ByValue => repair_by_value(table, column, range, rng)?,
    };

    log::debug!(
        "{}.{}: repaired {} cells from [{}, {})",
        table.name(),
        column,
        repaired,
        range.lo(),
        range.hi()
    );

    Ok(ColumnRepair {
        table: table.name().to_string(),
        column: column.to_string(),
        repaired,
    })
}

fn repair_per_row<R: Rng + ?Sized>(
    table: &mut Table,
    column: &str,
    range: RepairRange,
    rng: &mut R,
) -> EtlResult<usize> {
    let mut repaired = 0;

    for cell in table.column_mut(column)? {
        if let Some(start) = corrupt_suffix_start(cell) {
            let draw = range.draw(rng);
            cell.replace_range(start.., &draw.to_string());
            repaired += 1;
        }
    }

    Ok(repaired)
}

fn repair_by_value<R: Rng + ?Sized>(
    table: &mut Table,
    column: &str,
    range: RepairRange,
    rng: &mut R,
) -> EtlResult<usize> {
    let originals: Vec<String> = table
        .column(column)?
        .into_iter()
        .map(String::from)
        .collect();
    let mut repaired = 0;

    for original in originals {
        let Some(start) = corrupt_suffix_start(&original) else {
            continue;
        };
        let cleaned = format!("{}{}", &original[..start], range.draw(rng));

        // Earlier iterations may already have rewritten every copy
        for cell in table.column_mut(column)? {
            if *cell == original {
                *cell = cleaned.clone();
                repaired += 1;
            }
        }
    }

    Ok(repaired)
}

/// Repair several columns of one table, in the order given.
pub fn repair_table<R: Rng + ?Sized>(
    table: &mut Table,
    plan: &[(&str, RepairRange)],
    substitution: Substitution,
    rng: &mut R,
) -> EtlResult<Vec<ColumnRepair>> {
    plan.iter()
        .map(|(column, range)| repair_column(table, column, *range, substitution, rng))
        .collect()
}

// ============================================================================
// REPAIR PLAN
// ============================================================================

/// Replacement ranges for every repaired column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairPlan {
    pub housing_median_age: RepairRange,
    pub total_rooms: RepairRange,
    pub total_bedrooms: RepairRange,
    pub population: RepairRange,
    pub households: RepairRange,
    pub median_house_value: RepairRange,
    pub median_income: RepairRange,
}

impl RepairPlan {
    pub fn housing(&self) -> Vec<(&'static str, RepairRange)> {
        vec![
            ("housing_median_age", self.housing_median_age),
            ("total_rooms", self.total_rooms),
            ("total_bedrooms", self.total_bedrooms),
            ("population", self.population),
            ("households", self.households),
            ("median_house_value", self.median_house_value),
        ]
    }

    pub fn income(&self) -> Vec<(&'static str, RepairRange)> {
        vec![("median_income", self.median_income)]
    }
}

impl Default for RepairPlan {
    fn default() -> Self {
        RepairPlan {
            housing_median_age: RepairRange { lo: 10, hi: 51 },
            total_rooms: RepairRange { lo: 1000, hi: 2001 },
            total_bedrooms: RepairRange { lo: 1000, hi: 2001 },
            population: RepairRange { lo: 5000, hi: 10001 },
            households: RepairRange { lo: 500, hi: 2501 },
            median_house_value: RepairRange {
                lo: 100_000,
                hi: 250_001,
            },
            median_income: RepairRange {
                lo: 100_000,
                hi: 750_001,
            },
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
