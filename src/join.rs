// 🔗 Join - Housing ⋈ Income ⋈ Locality on zip_code
//
// Plain inner-join semantics: a ZIP must be present in all three tables to
// survive, and duplicate keys produce every pairing (left row order first,
// then right row order).

use crate::error::EtlResult;
use crate::table::{Table, HOUSING_COLUMNS, INCOME_COLUMNS, LOCALITY_COLUMNS, ZIP_CODE};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Column order of the sink's housing table
pub const SINK_COLUMNS: [&str; 11] = [
    "zip_code",
    "city",
    "state",
    "county",
    "median_age",
    "total_rooms",
    "total_bedrooms",
    "population",
    "households",
    "median_income",
    "median_house_value",
];

/// One locality's housing, income and locality attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRecord {
    pub zip_code: String,
    pub city: String,
    pub state: String,
    pub county: String,
    pub median_age: String,
    pub total_rooms: String,
    pub total_bedrooms: String,
    pub population: String,
    pub households: String,
    pub median_income: String,
    pub median_house_value: String,
}

impl MergedRecord {
    /// Values in `SINK_COLUMNS` order
    pub fn values(&self) -> [&str; 11] {
        [
            self.zip_code.as_str(),
            self.city.as_str(),
            self.state.as_str(),
            self.county.as_str(),
            self.median_age.as_str(),
            self.total_rooms.as_str(),
            self.total_bedrooms.as_str(),
            self.population.as_str(),
            self.households.as_str(),
            self.median_income.as_str(),
            self.median_house_value.as_str(),
        ]
    }

    fn from_rows(
        housing: &Table,
        h: usize,
        income: &Table,
        i: usize,
        locality: &Table,
        l: usize,
    ) -> EtlResult<Self> {
        Ok(MergedRecord {
            zip_code: housing.get(h, ZIP_CODE)?.to_string(),
            city: locality.get(l, "city")?.to_string(),
            state: locality.get(l, "state")?.to_string(),
            county: locality.get(l, "county")?.to_string(),
            median_age: housing.get(h, "housing_median_age")?.to_string(),
            total_rooms: housing.get(h, "total_rooms")?.to_string(),
            total_bedrooms: housing.get(h, "total_bedrooms")?.to_string(),
            population: housing.get(h, "population")?.to_string(),
            households: housing.get(h, "households")?.to_string(),
            median_income: income.get(i, "median_income")?.to_string(),
            median_house_value: housing.get(h, "median_house_value")?.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JoinReport {
    pub merged_rows: usize,
    /// ZIP codes of each table that found no partner in the join
    pub dropped_housing: BTreeSet<String>,
    pub dropped_income: BTreeSet<String>,
    pub dropped_locality: BTreeSet<String>,
}

impl JoinReport {
    pub fn dropped_total(&self) -> usize {
        self.dropped_housing.len() + self.dropped_income.len() + self.dropped_locality.len()
    }
}

fn index_by_zip(table: &Table) -> EtlResult<HashMap<&str, Vec<usize>>> {
    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (row, zip) in table.column(ZIP_CODE)?.into_iter().enumerate() {
        index.entry(zip).or_default().push(row);
    }
    Ok(index)
}

fn dropped(table: &Table, kept: &BTreeSet<&str>) -> EtlResult<BTreeSet<String>> {
    Ok(table
        .column(ZIP_CODE)?
        .into_iter()
        .filter(|zip| !kept.contains(zip))
        .map(String::from)
        .collect())
}

pub fn join_tables(
    housing: &Table,
    income: &Table,
    locality: &Table,
) -> EtlResult<(Vec<MergedRecord>, JoinReport)> {
    housing.require_columns(HOUSING_COLUMNS)?;
    income.require_columns(INCOME_COLUMNS)?;
    locality.require_columns(LOCALITY_COLUMNS)?;

    let income_index = index_by_zip(income)?;
    let locality_index = index_by_zip(locality)?;

    let mut records = Vec::new();
    let mut kept: BTreeSet<&str> = BTreeSet::new();

    for (h, zip) in housing.column(ZIP_CODE)?.into_iter().enumerate() {
        let (Some(income_rows), Some(locality_rows)) =
            (income_index.get(zip), locality_index.get(zip))
        else {
            continue;
        };

        kept.insert(zip);
        for &i in income_rows {
            for &l in locality_rows {
                records.push(MergedRecord::from_rows(housing, h, income, i, locality, l)?);
            }
        }
    }

    let report = JoinReport {
        merged_rows: records.len(),
        dropped_housing: dropped(housing, &kept)?,
        dropped_income: dropped(income, &kept)?,
        dropped_locality: dropped(locality, &kept)?,
    };

    if report.dropped_total() > 0 {
        log::warn!(
            "join dropped ZIP codes: {} housing, {} income, {} locality",
            report.dropped_housing.len(),
            report.dropped_income.len(),
            report.dropped_locality.len()
        );
    }
    log::info!("join produced {} merged records", report.merged_rows);

    Ok((records, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn housing(zips: &[&str]) -> Table {
        zips.iter().fold(Table::new("housing", HOUSING_COLUMNS), |t, zip| {
            t.with_row(&[*zip, "25", "1500", "1200", "7000", "900", "180000"])
        })
    }

    fn income(zips: &[&str]) -> Table {
        zips.iter()
            .enumerate()
            .fold(Table::new("income", INCOME_COLUMNS), |t, (n, zip)| {
                let value = format!("{}", 100_000 + n);
                t.with_row(&[*zip, value.as_str()])
            })
    }

    fn locality(zips: &[&str]) -> Table {
        zips.iter().fold(Table::new("locality", LOCALITY_COLUMNS), |t, zip| {
            t.with_row(&[*zip, "Springfield", "Greene", "MO"])
        })
    }

    #[test]
    fn test_only_zips_in_all_three_survive() {
        let (records, report) = join_tables(
            &housing(&["A", "B", "C"]),
            &income(&["B", "C", "D"]),
            &locality(&["B", "C"]),
        )
        .unwrap();

        let zips: Vec<&str> = records.iter().map(|r| r.zip_code.as_str()).collect();
        assert_eq!(zips, vec!["B", "C"]);

        assert_eq!(report.merged_rows, 2);
        assert!(report.dropped_housing.contains("A"));
        assert!(report.dropped_income.contains("D"));
        assert!(report.dropped_locality.is_empty());
    }

    #[test]
    fn test_duplicate_keys_pair_every_row() {
        let (records, _) = join_tables(
            &housing(&["60000", "60000"]),
            &income(&["60000", "60000", "60000"]),
            &locality(&["60000"]),
        )
        .unwrap();

        assert_eq!(records.len(), 6);
        assert_eq!(records[0].median_income, "100000");
        assert_eq!(records[2].median_income, "100002");
        assert_eq!(records[3].median_income, "100000");
    }

    #[test]
    fn test_record_takes_fields_from_each_table() {
        let (records, _) =
            join_tables(&housing(&["65801"]), &income(&["65801"]), &locality(&["65801"])).unwrap();

        let record = &records[0];
        assert_eq!(
            record.values(),
            [
                "65801",
                "Springfield",
                "MO",
                "Greene",
                "25",
                "1500",
                "1200",
                "7000",
                "900",
                "100000",
                "180000"
            ]
        );
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let bad_income = Table::new("income", &["zip_code"]).with_row(&["65801"]);

        let result = join_tables(&housing(&["65801"]), &bad_income, &locality(&["65801"]));

        assert!(result.is_err());
    }
}
