use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use payroll_core::{AssessmentUnitId, Household, HouseholdId, Person, PersonId};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when loading population CSV files.
#[derive(Debug, Error)]
pub enum CsvLoadError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Invalid flag '{0}' (expected true/false or 1/0)")]
    InvalidFlag(String),

    #[error("{record} {id}: {field} must not be negative, got {value}")]
    NegativeAmount {
        record: &'static str,
        id: u64,
        field: &'static str,
        value: Decimal,
    },
}

impl From<csv::Error> for CsvLoadError {
    fn from(err: csv::Error) -> Self {
        CsvLoadError::CsvParse(err.to_string())
    }
}

/// A single row of `persons.csv`.
///
/// The three contribution columns may be left empty; an empty cell means
/// the value was not supplied.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PersonRecord {
    pub person_id: PersonId,
    pub assessment_unit_id: AssessmentUnitId,
    pub household_id: HouseholdId,
    pub joint_assessment: String,
    pub single_parent: String,
    pub gross_wage_m: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub pension_contribution_m: Option<Decimal>,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub health_contribution_m: Option<Decimal>,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub care_contribution_m: Option<Decimal>,
}

/// A single row of `households.csv`. All amounts are monthly.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HouseholdRecord {
    pub household_id: HouseholdId,
    pub subsistence_floor: Decimal,
    pub core_benefit_income: Decimal,
    pub child_benefit: Decimal,
    pub advance_child_support: Decimal,
    pub housing_benefit: Decimal,
    pub child_supplement: Decimal,
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn parse_flag(value: &str) -> Result<bool, CsvLoadError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(CsvLoadError::InvalidFlag(value.to_string())),
    }
}

fn check_non_negative(
    record: &'static str,
    id: u64,
    field: &'static str,
    value: Decimal,
) -> Result<Decimal, CsvLoadError> {
    if value < Decimal::ZERO {
        return Err(CsvLoadError::NegativeAmount {
            record,
            id,
            field,
            value,
        });
    }
    Ok(value)
}

fn check_optional(
    id: u64,
    field: &'static str,
    value: Option<Decimal>,
) -> Result<Option<Decimal>, CsvLoadError> {
    value
        .map(|v| check_non_negative("person", id, field, v))
        .transpose()
}

impl TryFrom<PersonRecord> for Person {
    type Error = CsvLoadError;

    fn try_from(record: PersonRecord) -> Result<Self, Self::Error> {
        let id = record.person_id;
        Ok(Person {
            person_id: id,
            assessment_unit_id: record.assessment_unit_id,
            household_id: record.household_id,
            joint_assessment: parse_flag(&record.joint_assessment)?,
            single_parent: parse_flag(&record.single_parent)?,
            gross_wage_m: check_non_negative("person", id, "gross_wage_m", record.gross_wage_m)?,
            pension_contribution_m: check_optional(
                id,
                "pension_contribution_m",
                record.pension_contribution_m,
            )?,
            health_contribution_m: check_optional(
                id,
                "health_contribution_m",
                record.health_contribution_m,
            )?,
            care_contribution_m: check_optional(
                id,
                "care_contribution_m",
                record.care_contribution_m,
            )?,
        })
    }
}

impl TryFrom<HouseholdRecord> for Household {
    type Error = CsvLoadError;

    fn try_from(record: HouseholdRecord) -> Result<Self, Self::Error> {
        let id = record.household_id;
        let check = |field: &'static str, value: Decimal| {
            check_non_negative("household", id, field, value)
        };
        Ok(Household {
            household_id: id,
            subsistence_floor: check("subsistence_floor", record.subsistence_floor)?,
            core_benefit_income: check("core_benefit_income", record.core_benefit_income)?,
            child_benefit: check("child_benefit", record.child_benefit)?,
            advance_child_support: check("advance_child_support", record.advance_child_support)?,
            housing_benefit: check("housing_benefit", record.housing_benefit)?,
            child_supplement: check("child_supplement", record.child_supplement)?,
        })
    }
}

/// Loader for the person and household tables of a population.
pub struct PopulationLoader;

impl PopulationLoader {
    /// Parse persons from a CSV reader.
    pub fn parse_persons<R: Read>(reader: R) -> Result<Vec<Person>, CsvLoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut persons = Vec::new();

        for result in csv_reader.deserialize() {
            let record: PersonRecord = result?;
            persons.push(Person::try_from(record)?);
        }

        debug!(count = persons.len(), "parsed persons");
        Ok(persons)
    }

    /// Parse households from a CSV reader.
    pub fn parse_households<R: Read>(reader: R) -> Result<Vec<Household>, CsvLoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut households = Vec::new();

        for result in csv_reader.deserialize() {
            let record: HouseholdRecord = result?;
            households.push(Household::try_from(record)?);
        }

        debug!(count = households.len(), "parsed households");
        Ok(households)
    }

    pub fn load_persons(path: &Path) -> Result<Vec<Person>, CsvLoadError> {
        Self::parse_persons(open(path)?)
    }

    pub fn load_households(path: &Path) -> Result<Vec<Household>, CsvLoadError> {
        Self::parse_households(open(path)?)
    }
}

fn open(path: &Path) -> Result<File, CsvLoadError> {
    File::open(path).map_err(|source| CsvLoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
