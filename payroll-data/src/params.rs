use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use payroll_core::calculations::{TariffError, TariffSpec};
use payroll_core::{Allowances, HealthAllowanceRules, ParameterError, ParameterSet};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when loading a parameter file.
#[derive(Debug, Error)]
pub enum ParamsLoadError {
    #[error("Failed to read parameter file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid parameter file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid [{section}] table: {source}")]
    Tariff {
        section: &'static str,
        #[source]
        source: TariffError,
    },

    #[error("[{0}] sets both intercepts and first_intercept")]
    ConflictingIntercepts(&'static str),

    #[error(transparent)]
    Parameters(#[from] ParameterError),
}

/// A parameter file as written on disk.
///
/// Decimal amounts are written as strings so that no precision is lost on
/// the way through TOML floats.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParameterRecord {
    pub effective_date: NaiveDate,
    pub work_expense_allowance: Decimal,
    pub special_expense_allowance: Decimal,
    pub single_parent_relief: Decimal,
    pub min_health_share: Decimal,
    pub health_ceiling: HealthCeilingRecord,
    pub base_tariff: TariffRecord,
    pub pension_share: TariffRecord,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HealthCeilingRecord {
    pub single_earner_couple: Decimal,
    pub other: Decimal,
}

/// Thresholds and rates of a piecewise polynomial, with either explicit
/// intercepts or a first intercept to derive the rest from.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TariffRecord {
    pub thresholds: Vec<Decimal>,
    pub rates: Vec<Vec<Decimal>>,
    #[serde(default)]
    pub intercepts: Option<Vec<Decimal>>,
    #[serde(default)]
    pub first_intercept: Option<Decimal>,
}

impl TariffRecord {
    fn into_spec(
        self,
        section: &'static str,
    ) -> Result<TariffSpec, ParamsLoadError> {
        let spec = match (self.intercepts, self.first_intercept) {
            (Some(_), Some(_)) => return Err(ParamsLoadError::ConflictingIntercepts(section)),
            (Some(intercepts), None) => {
                TariffSpec::from_parts(self.thresholds, self.rates, intercepts)
            }
            (None, first_intercept) => TariffSpec::from_continuity(
                self.thresholds,
                self.rates,
                first_intercept.unwrap_or_default(),
            ),
        };
        spec.map_err(|source| ParamsLoadError::Tariff { section, source })
    }
}

impl ParameterRecord {
    /// Validates the record into an immutable [`ParameterSet`].
    pub fn into_parameter_set(self) -> Result<ParameterSet, ParamsLoadError> {
        let base_tariff = self.base_tariff.into_spec("base_tariff")?;
        let pension_share = self.pension_share.into_spec("pension_share")?;

        let params = ParameterSet::new(
            self.effective_date,
            base_tariff,
            pension_share,
            Allowances {
                work_expense: self.work_expense_allowance,
                special_expense: self.special_expense_allowance,
                single_parent_relief: self.single_parent_relief,
            },
            HealthAllowanceRules {
                min_share: self.min_health_share,
                ceiling_single_earner_couple: self.health_ceiling.single_earner_couple,
                ceiling_other: self.health_ceiling.other,
            },
        )?;
        debug!(
            effective_date = %params.effective_date(),
            brackets = params.base_tariff().brackets().len(),
            degree = params.base_tariff().degree(),
            "parameter set validated"
        );

        Ok(params)
    }
}

/// Parses and validates a parameter set from TOML text.
pub fn load_from_str(text: &str) -> Result<ParameterSet, ParamsLoadError> {
    let record: ParameterRecord = toml::from_str(text)?;
    record.into_parameter_set()
}

/// Reads, parses and validates a parameter file.
pub fn load_from_file(path: &Path) -> Result<ParameterSet, ParamsLoadError> {
    let text = fs::read_to_string(path).map_err(|source| ParamsLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&text)
}
