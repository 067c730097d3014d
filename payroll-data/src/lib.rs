//! File formats and batch driver around `payroll-core`.
//!
//! Parameter sets are read from TOML, populations from two CSV tables, and
//! results are written back as CSV.

pub mod batch;
pub mod params;
pub mod population;
pub mod report;

pub use batch::{BatchConfig, BatchError, BatchSummary, run_batch};
pub use params::{ParamsLoadError, load_from_file, load_from_str};
pub use population::{CsvLoadError, PopulationLoader};
pub use report::{ReportError, write_household_results, write_person_results};
