// 🚰 Pipeline - Read, repair, propagate and join the three datasets
//
// Order matters: column repair and ZIP repair work on the raw tables, the
// repaired ZIPs are pushed into housing and income, and only then are the
// tables joined.

use crate::config::Config;
use crate::error::EtlResult;
use crate::join::{join_tables, JoinReport, MergedRecord};
use crate::repair::{repair_table, ColumnRepair, RepairPlan, Substitution};
use crate::table::{load_csv, Table, HOUSING_COLUMNS, INCOME_COLUMNS, LOCALITY_COLUMNS};
use crate::zip_repair::{propagate_zip_codes, repair_zip_codes, Propagation, ZipRepairReport};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// The three input tables
#[derive(Debug, Clone)]
pub struct Datasets {
    pub housing: Table,
    pub income: Table,
    pub locality: Table,
}

impl Datasets {
    pub fn load(config: &Config) -> EtlResult<Self> {
        Ok(Datasets {
            housing: load_csv("housing", &config.housing_file, HOUSING_COLUMNS)?,
            income: load_csv("income", &config.income_file, INCOME_COLUMNS)?,
            locality: load_csv("locality", &config.zip_file, LOCALITY_COLUMNS)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CleaningReport {
    pub column_repairs: Vec<ColumnRepair>,
    pub zip: ZipRepairReport,
    pub propagation: Vec<Propagation>,
}

impl CleaningReport {
    pub fn cells_repaired(&self) -> usize {
        self.column_repairs.iter().map(|r| r.repaired).sum()
    }
}

/// Repair every dataset in place and align their ZIP codes.
pub fn clean<R: Rng + ?Sized>(
    datasets: &mut Datasets,
    plan: &RepairPlan,
    substitution: Substitution,
    rng: &mut R,
) -> EtlResult<CleaningReport> {
    println!("🧹 Cleaning Housing File data");
    let mut column_repairs =
        repair_table(&mut datasets.housing, &plan.housing(), substitution, rng)?;

    println!("🧹 Cleaning Income File data");
    column_repairs.extend(repair_table(
        &mut datasets.income,
        &plan.income(),
        substitution,
        rng,
    )?);

    println!("🧹 Cleaning ZIP File data");
    let zip = repair_zip_codes(&mut datasets.locality)?;
    println!("✓ {}", zip.summary());

    let propagation = vec![
        propagate_zip_codes(&datasets.locality, &mut datasets.housing)?,
        propagate_zip_codes(&datasets.locality, &mut datasets.income)?,
    ];

    Ok(CleaningReport {
        column_repairs,
        zip,
        propagation,
    })
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<MergedRecord>,
    pub cleaning: CleaningReport,
    pub join: JoinReport,
    /// Seed the column repair actually used
    pub seed: u64,
}

/// Read the configured files, clean them and join them into merged records.
pub fn run(config: &Config) -> EtlResult<PipelineOutput> {
    let seed = config.seed.unwrap_or_else(rand::random);
    log::info!("column repair seed: {}", seed);
    let mut rng = Pcg64Mcg::seed_from_u64(seed);

    println!("📂 Beginning import");
    let mut datasets = Datasets::load(config)?;
    println!(
        "✓ Read {} housing, {} income, {} locality rows",
        datasets.housing.len(),
        datasets.income.len(),
        datasets.locality.len()
    );

    let cleaning = clean(&mut datasets, &config.repair, config.substitution, &mut rng)?;
    println!("✓ Repaired {} corrupted cells", cleaning.cells_repaired());

    let (records, join) = join_tables(&datasets.housing, &datasets.income, &datasets.locality)?;
    println!("✓ {} merged records ready to load", records.len());

    Ok(PipelineOutput {
        records,
        cleaning,
        join,
        seed,
    })
}
