// 📮 ZIP Repair - Infer replacement ZIP codes for corrupted locality rows
//
// A locality row whose zip_code is exactly four uppercase letters is "bad".
// Every other row is "good" and feeds a lookup of leading ZIP digits keyed by
// city‖state. Bad rows are resolved through three tiers, in order:
//
//   Locality → county‖state of the bad row, looked up among the city‖state keys
//   County   → county‖state of the bad row, looked up among good rows' counties
//   State    → first good locality seen in the same state
//
// A hit yields `value[..3] + "00"`. A row with no hit keeps its marker.

use crate::error::{EtlError, EtlResult};
use crate::table::{Table, GUID, ZIP_CODE};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

static CORRUPT_ZIP: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^[A-Z]{4}$").expect("corrupt zip pattern is valid"));

/// Suffix appended to a good ZIP's leading digit when it enters the lookup
const LOOKUP_SUFFIX: &str = "0000";

/// Suffix appended to the first three characters of a lookup hit
const RESOLVED_SUFFIX: &str = "00";

pub fn is_corrupt_zip(zip: &str) -> bool {
    CORRUPT_ZIP.is_match(zip)
}

/// Locality key: two descriptive fields glued together
pub fn locality_key(place: &str, state: &str) -> String {
    format!("{}{}", place, state)
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub good: Vec<usize>,
    pub bad: Vec<usize>,
}

pub fn classify(locality: &Table) -> EtlResult<Classification> {
    let mut classification = Classification::default();

    for (row, zip) in locality.column(ZIP_CODE)?.into_iter().enumerate() {
        if is_corrupt_zip(zip) {
            classification.bad.push(row);
        } else {
            classification.good.push(row);
        }
    }

    Ok(classification)
}

// ============================================================================
// GOOD-ZIP LOOKUP
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ZipTier {
    Locality,
    County,
    State,
}

impl ZipTier {
    pub fn name(&self) -> &str {
        match self {
            ZipTier::Locality => "locality",
            ZipTier::County => "county",
            ZipTier::State => "state",
        }
    }
}

/// Leading ZIP digits of the good rows, indexed by locality.
///
/// Built once from the good rows and never changed afterwards. Later rows
/// overwrite earlier ones that share a key.
#[derive(Debug, Clone, Default)]
pub struct GoodZipLookup {
    by_city: HashMap<String, String>,
    by_county: HashMap<String, String>,
    /// state → first city key seen for that state
    first_in_state: HashMap<String, String>,
}

impl GoodZipLookup {
    pub fn build(locality: &Table, good_rows: &[usize]) -> EtlResult<Self> {
        let mut lookup = GoodZipLookup::default();

        for &row in good_rows {
            let zip = locality.get(row, ZIP_CODE)?;
            let Some(lead) = zip.chars().next() else {
                log::warn!("locality row {}: empty zip_code, not used for lookup", row);
                continue;
            };
            let value = format!("{}{}", lead, LOOKUP_SUFFIX);

            let city = locality.get(row, "city")?;
            let county = locality.get(row, "county")?;
            let state = locality.get(row, "state")?;

            let city_key = locality_key(city, state);
            lookup
                .first_in_state
                .entry(state.to_string())
                .or_insert_with(|| city_key.clone());
            lookup.by_city.insert(city_key, value.clone());
            lookup.by_county.insert(locality_key(county, state), value);
        }

        Ok(lookup)
    }

    /// city‖state keys of the lookup
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.by_city.keys().map(|k| k.as_str())
    }

    pub fn get(&self, city_key: &str) -> Option<&str> {
        self.by_city.get(city_key).map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_city.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_city.is_empty()
    }

    /// Find the lookup value for a locality, walking the tiers in order.
    pub fn find(&self, county: &str, state: &str) -> Option<(ZipTier, &str)> {
        let key = locality_key(county, state);

        if let Some(value) = self.by_city.get(&key) {
            return Some((ZipTier::Locality, value.as_str()));
        }

        if let Some(value) = self.by_county.get(&key) {
            return Some((ZipTier::County, value.as_str()));
        }

        self.first_in_state
            .get(state)
            .and_then(|key| self.by_city.get(key))
            .map(|value| (ZipTier::State, value.as_str()))
    }

    /// Replacement ZIP for a locality, or None when no tier matches
    pub fn resolve(&self, county: &str, state: &str) -> Option<(ZipTier, String)> {
        self.find(county, state).map(|(tier, value)| {
            let head: String = value.chars().take(3).collect();
            (tier, format!("{}{}", head, RESOLVED_SUFFIX))
        })
    }
}

// ============================================================================
// REPAIR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZipResolution {
    pub row: usize,
    pub tier: ZipTier,
    pub zip_code: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ZipRepairReport {
    pub good_rows: usize,
    pub bad_rows: usize,
    pub resolved: Vec<ZipResolution>,
    /// Bad rows left with their marker
    pub unresolved: Vec<usize>,
}

impl ZipRepairReport {
    pub fn resolved_by(&self, tier: ZipTier) -> usize {
        self.resolved.iter().filter(|r| r.tier == tier).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} bad of {} rows: {} by locality, {} by county, {} by state, {} unresolved",
            self.bad_rows,
            self.good_rows + self.bad_rows,
            self.resolved_by(ZipTier::Locality),
            self.resolved_by(ZipTier::County),
            self.resolved_by(ZipTier::State),
            self.unresolved.len()
        )
    }
}

/// Replace every resolvable corrupted ZIP in the locality table.
pub fn repair_zip_codes(locality: &mut Table) -> EtlResult<ZipRepairReport> {
    let classification = classify(locality)?;
    let lookup = GoodZipLookup::build(locality, &classification.good)?;

    let mut report = ZipRepairReport {
        good_rows: classification.good.len(),
        bad_rows: classification.bad.len(),
        ..Default::default()
    };

    for &row in &classification.bad {
        let resolution = lookup.resolve(
            locality.get(row, "county")?,
            locality.get(row, "state")?,
        );

        match resolution {
            Some((tier, zip_code)) => {
                log::debug!("locality row {}: {} via {} tier", row, zip_code, tier.name());
                locality.set(row, ZIP_CODE, zip_code.clone())?;
                report.resolved.push(ZipResolution {
                    row,
                    tier,
                    zip_code,
                });
            }
            None => {
                log::warn!(
                    "locality row {}: no good ZIP in state '{}', keeping '{}'",
                    row,
                    locality.get(row, "state")?,
                    locality.get(row, ZIP_CODE)?
                );
                report.unresolved.push(row);
            }
        }
    }

    log::info!("zip repair: {}", report.summary());

    Ok(report)
}

// ============================================================================
// PROPAGATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PropagationMode {
    /// Rows matched through the guid column
    Keyed,
    /// Row N of locality feeds row N of the target
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Propagation {
    pub target: String,
    pub mode: PropagationMode,
    pub assigned: usize,
}

/// Copy the repaired zip_code column from locality into `target`.
///
/// Rows are paired by guid when both tables carry one and every target guid
/// is present in locality. Otherwise they are paired by position, which
/// requires equal row counts. Every target row ends up with a locality ZIP.
pub fn propagate_zip_codes(locality: &Table, target: &mut Table) -> EtlResult<Propagation> {
    target.column_index(ZIP_CODE)?;

    if locality.has_column(GUID) && target.has_column(GUID) {
        if let Some(propagation) = propagate_keyed(locality, target)? {
            return Ok(propagation);
        }
        log::warn!(
            "{}: guids do not all match locality, pairing rows by position",
            target.name()
        );
    }

    propagate_positional(locality, target)
}

/// None when some target guid has no locality row; target is left untouched
fn propagate_keyed(locality: &Table, target: &mut Table) -> EtlResult<Option<Propagation>> {
    let zips: HashMap<&str, &str> = locality
        .column(GUID)?
        .into_iter()
        .zip(locality.column(ZIP_CODE)?)
        .collect();

    let mut assignments = Vec::with_capacity(target.len());
    for guid in target.column(GUID)? {
        match zips.get(guid) {
            Some(zip) => assignments.push(zip.to_string()),
            None => return Ok(None),
        }
    }

    let assigned = assignments.len();
    for (cell, zip) in target.column_mut(ZIP_CODE)?.zip(assignments) {
        *cell = zip;
    }

    Ok(Some(Propagation {
        target: target.name().to_string(),
        mode: PropagationMode::Keyed,
        assigned,
    }))
}

fn propagate_positional(locality: &Table, target: &mut Table) -> EtlResult<Propagation> {
    if locality.len() != target.len() {
        return Err(EtlError::RowCountMismatch {
            target: target.name().to_string(),
            expected: locality.len(),
            actual: target.len(),
        });
    }

    let zips = locality.column(ZIP_CODE)?;
    for (cell, zip) in target.column_mut(ZIP_CODE)?.zip(zips) {
        *cell = zip.to_string();
    }

    Ok(Propagation {
        target: target.name().to_string(),
        mode: PropagationMode::Positional,
        assigned: locality.len(),
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::LOCALITY_COLUMNS;

    fn locality(rows: &[[&str; 4]]) -> Table {
        rows.iter().fold(Table::new("locality", LOCALITY_COLUMNS), |t, r| {
            t.with_row(r)
        })
    }

    #[test]
    fn test_corrupt_zip_is_whole_string_match() {
        assert!(is_corrupt_zip("WXYZ"));
        assert!(!is_corrupt_zip("65801"));
        assert!(!is_corrupt_zip("1WXYZ"));
        assert!(!is_corrupt_zip("WXYZA"));
        assert!(!is_corrupt_zip("wxyz"));
        assert!(!is_corrupt_zip(""));
    }

    #[test]
    fn test_classify_partitions_rows() {
        let table = locality(&[
            ["65801", "Springfield", "Greene", "MO"],
            ["WXYZ", "Springfield", "Greene", "MO"],
            ["64101", "Kansas City", "Jackson", "MO"],
            ["ABCD", "Reno", "Washoe", "NV"],
        ]);

        let classification = classify(&table).unwrap();

        assert_eq!(classification.good, vec![0, 2]);
        assert_eq!(classification.bad, vec![1, 3]);
    }

    #[test]
    fn test_lookup_keys_come_only_from_good_rows() {
        let table = locality(&[
            ["65801", "Springfield", "Greene", "MO"],
            ["WXYZ", "Reno", "Washoe", "NV"],
            ["64101", "Kansas City", "Jackson", "MO"],
        ]);
        let classification = classify(&table).unwrap();

        let lookup = GoodZipLookup::build(&table, &classification.good).unwrap();

        let mut keys: Vec<&str> = lookup.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["Kansas CityMO", "SpringfieldMO"]);
        assert_eq!(lookup.get("SpringfieldMO"), Some("60000"));
        assert_eq!(lookup.get("RenoNV"), None);
    }

    #[test]
    fn test_lookup_last_write_wins() {
        let table = locality(&[
            ["65801", "Springfield", "Greene", "MO"],
            ["75801", "Springfield", "Greene", "MO"],
        ]);

        let lookup = GoodZipLookup::build(&table, &[0, 1]).unwrap();

        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.get("SpringfieldMO"), Some("70000"));
    }

    #[test]
    fn test_springfield_resolves_through_county_tier() {
        let mut table = locality(&[
            ["WXYZ", "Springfield", "Greene", "MO"],
            ["65801", "Springfield", "Greene", "MO"],
        ]);

        let report = repair_zip_codes(&mut table).unwrap();

        assert_eq!(table.get(0, ZIP_CODE).unwrap(), "60000");
        assert_eq!(table.get(1, ZIP_CODE).unwrap(), "65801");
        assert_eq!(report.bad_rows, 1);
        assert_eq!(report.resolved_by(ZipTier::County), 1);
        assert!(report.unresolved.is_empty());
    }

    #[test]
    fn test_county_key_looked_up_among_city_keys_first() {
        // Denver county shares its name with Denver city
        let mut table = locality(&[
            ["10001", "Denver", "Denver", "CO"],
            ["80202", "Aurora", "Arapahoe", "CO"],
            ["ABCD", "Aurora", "Denver", "CO"],
        ]);

        let report = repair_zip_codes(&mut table).unwrap();

        assert_eq!(table.get(2, ZIP_CODE).unwrap(), "10000");
        assert_eq!(
            report.resolved,
            vec![ZipResolution {
                row: 2,
                tier: ZipTier::Locality,
                zip_code: "10000".to_string(),
            }]
        );
    }

    #[test]
    fn test_resolved_zip_is_truncated_lookup_of_county_key() {
        let rows = [
            ["10001", "Denver", "Denver", "CO"],
            ["80202", "Aurora", "Arapahoe", "CO"],
            ["ABCD", "Aurora", "Denver", "CO"],
        ];
        let mut table = locality(&rows);
        let lookup = GoodZipLookup::build(&table, &[0, 1]).unwrap();
        let value = lookup.get(&locality_key("Denver", "CO")).unwrap().to_string();

        repair_zip_codes(&mut table).unwrap();

        let expected = format!("{}{}", &value[..3], RESOLVED_SUFFIX);
        assert_eq!(table.get(2, ZIP_CODE).unwrap(), expected);
        assert_ne!(table.get(2, ZIP_CODE).unwrap(), "80000");
    }

    #[test]
    fn test_county_tier_before_state_tier() {
        let mut table = locality(&[
            ["12345", "Alpha", "Cole", "MO"],
            ["65801", "Springfield", "Greene", "MO"],
            ["ABCD", "Battlefield", "Greene", "MO"],
        ]);

        let report = repair_zip_codes(&mut table).unwrap();

        assert_eq!(table.get(2, ZIP_CODE).unwrap(), "60000");
        assert_eq!(report.resolved[0].tier, ZipTier::County);
    }

    #[test]
    fn test_state_tier_uses_first_locality_of_state() {
        let mut table = locality(&[
            ["89501", "Reno", "Washoe", "NV"],
            ["12345", "Alpha", "Cole", "MO"],
            ["65801", "Springfield", "Greene", "MO"],
            ["ABCD", "Joplin", "Jasper", "MO"],
        ]);

        let report = repair_zip_codes(&mut table).unwrap();

        assert_eq!(table.get(3, ZIP_CODE).unwrap(), "10000");
        assert_eq!(
            report.resolved,
            vec![ZipResolution {
                row: 3,
                tier: ZipTier::State,
                zip_code: "10000".to_string(),
            }]
        );
    }

    #[test]
    fn test_unresolvable_row_keeps_marker() {
        let mut table = locality(&[
            ["65801", "Springfield", "Greene", "MO"],
            ["ABCD", "Reno", "Washoe", "NV"],
        ]);

        let report = repair_zip_codes(&mut table).unwrap();

        assert_eq!(table.get(1, ZIP_CODE).unwrap(), "ABCD");
        assert_eq!(report.unresolved, vec![1]);
        assert!(report.resolved.is_empty());
    }

    #[test]
    fn test_bad_rows_never_feed_the_lookup() {
        // The second bad row must not see the first one's repair
        let mut table = locality(&[
            ["ABCD", "Springfield", "Greene", "MO"],
            ["EFGH", "Springfield", "Greene", "MO"],
        ]);

        let report = repair_zip_codes(&mut table).unwrap();

        assert_eq!(report.unresolved, vec![0, 1]);
        assert_eq!(table.column(ZIP_CODE).unwrap(), vec!["ABCD", "EFGH"]);
    }

    #[test]
    fn test_repair_is_deterministic() {
        let rows = [
            ["65801", "Springfield", "Greene", "MO"],
            ["ABCD", "Ozark", "Christian", "MO"],
            ["89501", "Reno", "Washoe", "NV"],
            ["EFGH", "Sparks", "Washoe", "NV"],
        ];
        let mut a = locality(&rows);
        let mut b = locality(&rows);

        repair_zip_codes(&mut a).unwrap();
        repair_zip_codes(&mut b).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.column(ZIP_CODE).unwrap(), vec!["65801", "60000", "89501", "80000"]);
    }

    #[test]
    fn test_propagate_by_guid_ignores_row_order() {
        let locality = Table::new("locality", &["guid", "zip_code", "city", "county", "state"])
            .with_row(&["g1", "60000", "Springfield", "Greene", "MO"])
            .with_row(&["g2", "89501", "Reno", "Washoe", "NV"]);
        let mut income = Table::new("income", &["guid", "zip_code", "median_income"])
            .with_row(&["g2", "QRST", "50000"])
            .with_row(&["g1", "WXYZ", "40000"]);

        let propagation = propagate_zip_codes(&locality, &mut income).unwrap();

        assert_eq!(propagation.mode, PropagationMode::Keyed);
        assert_eq!(propagation.assigned, 2);
        assert_eq!(income.column(ZIP_CODE).unwrap(), vec!["89501", "60000"]);
    }

    #[test]
    fn test_unrelated_guids_fall_back_to_position() {
        let locality = Table::new("locality", &["guid", "zip_code", "city", "county", "state"])
            .with_row(&["L1", "60000", "Springfield", "Greene", "MO"]);
        let mut housing = Table::new("housing", &["guid", "zip_code", "total_rooms"])
            .with_row(&["H1", "QQQQ", "1500"]);

        let propagation = propagate_zip_codes(&locality, &mut housing).unwrap();

        assert_eq!(propagation.mode, PropagationMode::Positional);
        assert_eq!(housing.get(0, ZIP_CODE).unwrap(), "60000");
    }

    #[test]
    fn test_unrelated_guids_with_misaligned_rows_fail() {
        let locality = Table::new("locality", &["guid", "zip_code", "city", "county", "state"])
            .with_row(&["L1", "60000", "Springfield", "Greene", "MO"]);
        let mut housing = Table::new("housing", &["guid", "zip_code", "total_rooms"])
            .with_row(&["L1", "QQQQ", "1500"])
            .with_row(&["H2", "ZZZZ", "900"]);

        let err = propagate_zip_codes(&locality, &mut housing).unwrap_err();

        assert!(matches!(err, EtlError::RowCountMismatch { .. }));
        assert_eq!(housing.column(ZIP_CODE).unwrap(), vec!["QQQQ", "ZZZZ"]);
    }

    #[test]
    fn test_propagate_by_position() {
        let locality = locality(&[
            ["60000", "Springfield", "Greene", "MO"],
            ["89501", "Reno", "Washoe", "NV"],
        ]);
        let mut income = Table::new("income", &["zip_code", "median_income"])
            .with_row(&["WXYZ", "40000"])
            .with_row(&["QRST", "50000"]);

        let propagation = propagate_zip_codes(&locality, &mut income).unwrap();

        assert_eq!(propagation.mode, PropagationMode::Positional);
        assert_eq!(income.column(ZIP_CODE).unwrap(), vec!["60000", "89501"]);
    }

    #[test]
    fn test_propagate_by_position_rejects_misaligned_tables() {
        let locality = locality(&[["60000", "Springfield", "Greene", "MO"]]);
        let mut housing = Table::new("housing", &["zip_code", "total_rooms"])
            .with_row(&["WXYZ", "1"])
            .with_row(&["QRST", "2"]);

        let err = propagate_zip_codes(&locality, &mut housing).unwrap_err();

        assert!(matches!(
            err,
            EtlError::RowCountMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert_eq!(housing.get(0, ZIP_CODE).unwrap(), "WXYZ");
    }
}
