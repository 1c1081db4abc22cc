// 📄 Tables - CSV files held as header-addressed text
//
// Every value is kept exactly as it appears in the file. Repairs work on the
// text, and the sink stores text, so nothing is parsed into numbers here.

use crate::error::{EtlError, EtlResult};
use std::collections::HashMap;
use std::path::Path;

pub const ZIP_CODE: &str = "zip_code";
pub const GUID: &str = "guid";

pub const HOUSING_COLUMNS: &[&str] = &[
    ZIP_CODE,
    "housing_median_age",
    "total_rooms",
    "total_bedrooms",
    "population",
    "households",
    "median_house_value",
];

pub const INCOME_COLUMNS: &[&str] = &[ZIP_CODE, "median_income"];

pub const LOCALITY_COLUMNS: &[&str] = &[ZIP_CODE, "city", "county", "state"];

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();

        Table {
            name: name.to_string(),
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Builder-style row append, mostly for tests and fixtures.
    /// Short rows are padded with empty strings.
    pub fn with_row(mut self, values: &[&str]) -> Self {
        self.push_row(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn push_row(&mut self, mut values: Vec<String>) {
        values.resize(self.columns.len(), String::new());
        self.rows.push(values);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Position of `column` in each row, or `MissingColumn`
    pub fn column_index(&self, column: &str) -> EtlResult<usize> {
        self.index
            .get(column)
            .copied()
            .ok_or_else(|| EtlError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn require_columns(&self, columns: &[&str]) -> EtlResult<()> {
        for column in columns {
            self.column_index(column)?;
        }
        Ok(())
    }

    fn out_of_range(&self, row: usize) -> EtlError {
        EtlError::RowOutOfRange {
            table: self.name.clone(),
            row,
            len: self.rows.len(),
        }
    }

    pub fn get(&self, row: usize, column: &str) -> EtlResult<&str> {
        let col = self.column_index(column)?;
        self.rows
            .get(row)
            .map(|r| r[col].as_str())
            .ok_or_else(|| self.out_of_range(row))
    }

    pub fn set(&mut self, row: usize, column: &str, value: String) -> EtlResult<()> {
        let col = self.column_index(column)?;
        let err = self.out_of_range(row);
        let r = self.rows.get_mut(row).ok_or(err)?;
        r[col] = value;
        Ok(())
    }

    /// All values of one column, in row order
    pub fn column(&self, column: &str) -> EtlResult<Vec<&str>> {
        let col = self.column_index(column)?;
        Ok(self.rows.iter().map(|r| r[col].as_str()).collect())
    }

    /// Mutable access to every cell of one column, in row order
    pub fn column_mut(&mut self, column: &str) -> EtlResult<impl Iterator<Item = &mut String> + '_> {
        let col = self.column_index(column)?;
        Ok(self.rows.iter_mut().map(move |r| &mut r[col]))
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Read a headed CSV file into a table and check its required columns.
pub fn load_csv(name: &str, csv_path: &Path, required: &[&str]) -> EtlResult<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(csv_path)?;

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let header_refs: Vec<&str> = headers.iter().map(|h| h.as_str()).collect();
    let mut table = Table::new(name, &header_refs);

    for result in rdr.records() {
        let record = result?;
        table.push_row(record.iter().map(|v| v.to_string()).collect());
    }

    table.require_columns(required)?;

    log::info!(
        "loaded {} rows from {} ({})",
        table.len(),
        csv_path.display(),
        name
    );

    Ok(table)
}
