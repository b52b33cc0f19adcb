//! # Seed Data Loader
//!
//! Creates a fiscal period and loads the default chart of accounts and
//! master data into it.
//!
//! ## Usage
//! ```bash
//! # Current year into ./abaco_dev.db
//! cargo run -p abaco-db --bin seed
//!
//! # A given year and database
//! cargo run -p abaco-db --bin seed -- --year 2025 --db ./data/abaco.db
//!
//! # Longer sub-account codes
//! cargo run -p abaco-db --bin seed -- --length 12
//! ```

use abaco_core::{FiscalPeriod, DEFAULT_COMPANY_ID, DEFAULT_SUBACCOUNT_LENGTH};
use abaco_db::migrations::migration_status;
use abaco_db::seed::{seed_master_data, seed_period};
use abaco_db::{Database, DbConfig};
use chrono::{Datelike, Local};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,abaco_db=debug,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut year: i32 = Local::now().year();
    let mut length: usize = DEFAULT_SUBACCOUNT_LENGTH;
    let mut db_path = String::from("./abaco_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--year" | "-y" => {
                if i + 1 < args.len() {
                    year = args[i + 1].parse().unwrap_or(year);
                    i += 1;
                }
            }
            "--length" | "-l" => {
                if i + 1 < args.len() {
                    length = args[i + 1].parse().unwrap_or(length);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Abaco Seed Data Loader");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -y, --year <YEAR>   Fiscal year to create (default: current year)");
                println!("  -l, --length <N>    Sub-account code length (default: 10)");
                println!("  -d, --db <PATH>     Database file path (default: ./abaco_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Abaco Seed Data Loader");
    println!("======================");
    println!("Database: {}", db_path);
    println!("Year:     {}", year);
    println!();

    let period = FiscalPeriod::calendar_year(DEFAULT_COMPANY_ID, year, length)
        .ok_or_else(|| format!("invalid year: {year}"))?;

    let db = Database::new(DbConfig::new(&db_path)).await?;
    if !db.health_check().await {
        return Err(format!("database at {db_path} is not answering queries").into());
    }
    println!("✓ Connected to database");

    let (total, applied) = migration_status(db.pool()).await?;
    if applied < total {
        return Err(format!("{applied} of {total} migrations applied").into());
    }
    println!("✓ Migrations applied ({applied}/{total})");

    let mut tx = db.begin().await?;
    let summary = seed_period(&mut tx, &period).await?;
    seed_master_data(&mut tx).await?;
    tx.commit().await?;

    println!(
        "✓ Period {} ready: {} accounts, {} special sub-accounts",
        period.code, summary.accounts, summary.subaccounts
    );
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
