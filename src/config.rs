use crate::error::EtlResult;
use crate::repair::{RepairPlan, Substitution};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file when no path is passed
pub const CONFIG_ENV: &str = "HOUSING_ETL_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub housing_file: PathBuf,
    pub income_file: PathBuf,
    pub zip_file: PathBuf,
    /// SQLite database path (":memory:" works too)
    pub database: String,
    /// Fixed seed for column repair; drawn at random when absent
    pub seed: Option<u64>,
    pub substitution: Substitution,
    pub repair: RepairPlan,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            housing_file: PathBuf::from("data/housing-info.csv"),
            income_file: PathBuf::from("data/income-info.csv"),
            zip_file: PathBuf::from("data/zip-city-county-state.csv"),
            database: "housing.db".to_string(),
            seed: None,
            substitution: Substitution::default(),
            repair: RepairPlan::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> EtlResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Config from an explicit path, else from `$HOUSING_ETL_CONFIG`, else
    /// the built-in defaults.
    pub fn resolve(path: Option<&str>) -> EtlResult<Self> {
        let path = path
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        match path {
            Some(path) => Config::load(&path),
            None => {
                log::info!("no config file given, using defaults");
                Ok(Config::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repair::RepairRange;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "database": ":memory:",
                "seed": 42,
                "substitution": "by_value",
                "repair": { "median_income": [1, 2] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.database, ":memory:");
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.substitution, Substitution::ByValue);
        assert_eq!(config.repair.median_income, RepairRange::new(1, 2).unwrap());
        assert_eq!(config.repair.total_rooms, RepairPlan::default().total_rooms);
        assert_eq!(config.housing_file, PathBuf::from("data/housing-info.csv"));
    }

    #[test]
    fn test_empty_range_rejected() {
        let result: Result<Config, _> =
            serde_json::from_str(r#"{ "repair": { "households": [2501, 500] } }"#);

        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_substitution_rejected() {
        let result: Result<Config, _> = serde_json::from_str(r#"{ "substitution": "sometimes" }"#);

        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.json");
        std::fs::write(&path, r#"{ "zip_file": "zips.csv" }"#).unwrap();

        let config = Config::resolve(path.to_str()).unwrap();

        assert_eq!(config.zip_file, PathBuf::from("zips.csv"));
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load(Path::new("/nonexistent/etl.json")).is_err());
    }
}
