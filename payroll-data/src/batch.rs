use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use payroll_core::calculations::{Pipeline, PipelineError, PipelineOutput};
use thiserror::Error;
use tracing::info;

use crate::params::{self, ParamsLoadError};
use crate::population::{CsvLoadError, PopulationLoader};
use crate::report::{self, ReportError};

pub const PERSON_REPORT_FILE: &str = "person_results.csv";
pub const HOUSEHOLD_REPORT_FILE: &str = "household_results.csv";

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to load parameters: {0}")]
    Params(#[from] ParamsLoadError),

    #[error("Failed to load population: {0}")]
    Population(#[from] CsvLoadError),

    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Failed to write report: {0}")]
    Report(#[from] ReportError),

    #[error("Failed to create {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Input and output locations of one batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub params: PathBuf,
    pub persons: PathBuf,
    pub households: PathBuf,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub persons: usize,
    pub households: usize,
    pub person_report: PathBuf,
    pub household_report: PathBuf,
}

/// Loads parameters and population, runs the pipeline and writes both
/// result tables into `out_dir`.
pub fn run_batch(config: &BatchConfig) -> Result<BatchSummary, BatchError> {
    let params = params::load_from_file(&config.params)?;
    info!(
        effective_date = %params.effective_date(),
        path = %config.params.display(),
        "loaded parameter set"
    );

    let persons = PopulationLoader::load_persons(&config.persons)?;
    let households = PopulationLoader::load_households(&config.households)?;
    info!(
        persons = persons.len(),
        households = households.len(),
        "loaded population"
    );

    let output = Pipeline::new(&params)?.run(&persons, &households)?;

    fs::create_dir_all(&config.out_dir).map_err(|source| BatchError::Output {
        path: config.out_dir.clone(),
        source,
    })?;
    let (person_report, household_report) = write_reports(&output, &config.out_dir)?;

    Ok(BatchSummary {
        persons: output.persons.len(),
        households: output.households.len(),
        person_report,
        household_report,
    })
}

fn write_reports(
    output: &PipelineOutput,
    out_dir: &Path,
) -> Result<(PathBuf, PathBuf), BatchError> {
    let person_report = out_dir.join(PERSON_REPORT_FILE);
    report::write_person_results(BufWriter::new(create(&person_report)?), &output.persons)?;

    let household_report = out_dir.join(HOUSEHOLD_REPORT_FILE);
    report::write_household_results(
        BufWriter::new(create(&household_report)?),
        &output.households,
    )?;

    info!(
        person_report = %person_report.display(),
        household_report = %household_report.display(),
        "wrote result tables"
    );
    Ok((person_report, household_report))
}

fn create(path: &Path) -> Result<File, BatchError> {
    File::create(path).map_err(|source| BatchError::Output {
        path: path.to_path_buf(),
        source,
    })
}
