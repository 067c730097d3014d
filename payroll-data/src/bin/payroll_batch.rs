use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use payroll_data::{BatchConfig, run_batch};
use tracing_subscriber::EnvFilter;

/// Compute withholding tax and benefit precedence for a population.
///
/// The persons CSV should have the following columns:
/// - person_id, assessment_unit_id, household_id
/// - joint_assessment, single_parent: true/false or 1/0
/// - gross_wage_m: monthly gross wage
/// - pension_contribution_m, health_contribution_m, care_contribution_m:
///   monthly contributions, may be left empty
///
/// The households CSV should have the following columns:
/// - household_id, subsistence_floor, core_benefit_income, child_benefit,
///   advance_child_support, housing_benefit, child_supplement
#[derive(Parser, Debug)]
#[command(name = "payroll-batch")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML parameter set
    #[arg(short, long)]
    params: PathBuf,

    /// Path to the persons CSV file
    #[arg(long)]
    persons: PathBuf,

    /// Path to the households CSV file
    #[arg(long)]
    households: PathBuf,

    /// Directory for the result CSV files
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = BatchConfig {
        params: args.params,
        persons: args.persons,
        households: args.households,
        out_dir: args.out_dir,
    };

    let summary = run_batch(&config).with_context(|| {
        format!(
            "Batch failed for {} / {}",
            config.persons.display(),
            config.households.display()
        )
    })?;

    println!(
        "Processed {} persons and {} households.",
        summary.persons, summary.households
    );
    println!("Person results: {}", summary.person_report.display());
    println!("Household results: {}", summary.household_report.display());

    Ok(())
}
