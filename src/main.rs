use anyhow::{Context, Result};
use rusqlite::Connection;
use std::env;
use std::io;

use housing_etl::{
    load_records, open_database, pipeline, run_validation, setup_database, verify_count, Config,
    EtlError, PipelineOutput,
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = Config::resolve(args.get(1).map(String::as_str)).context("Failed to load config")?;

    println!("🗄️  Housing ETL v{}", housing_etl::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let output = pipeline::run(&config).context("Failed to prepare the datasets")?;

    // The connection lives for the rest of this scope and closes on drop
    let mut conn = match open_database(&config.database) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Error connecting to the database. Exiting: {}", e);
            std::process::exit(1);
        }
    };

    match import(&mut conn, &output) {
        Ok(count) => {
            println!("✓ Import completed, database holds {} rows", count);
            println!("\n🔍 Beginning validation\n");

            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut stdout = io::stdout();
            if let Err(e) = run_validation(&conn, &mut input, &mut stdout) {
                eprintln!("❌ An error has occurred: {}", e);
            }
        }
        Err(EtlError::LoadRejected { failures }) => {
            eprintln!("❌ Import rolled back, {} rows failed:", failures.len());
            for failure in &failures {
                eprintln!("   row {} (zip {}): {}", failure.row, failure.zip_code, failure.error);
            }
        }
        Err(e) => eprintln!("❌ An error has occurred. Exiting: {}", e),
    }

    drop(conn);
    println!("\nProgram exiting.");

    Ok(())
}

fn import(conn: &mut Connection, output: &PipelineOutput) -> Result<i64, EtlError> {
    println!("\n💾 Inserting {} records...", output.records.len());
    setup_database(conn)?;

    let report = load_records(conn, &output.records, Some(output.seed))?;
    println!("✓ Batch {} committed {} records", report.batch_id, report.rows_loaded);

    verify_count(conn)
}
