//! CSV result tables. Amounts are rounded half-up to cents here and nowhere
//! earlier.

use std::io::Write;

use payroll_core::calculations::common::round_half_up;
use payroll_core::calculations::{HouseholdResult, PersonResult};
use payroll_core::{HouseholdId, PersonId};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV write error: {0}")]
    CsvWrite(String),

    #[error("Failed to flush report: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        ReportError::CsvWrite(err.to_string())
    }
}

pub const PERSON_COLUMNS: [&str; 6] = [
    "person_id",
    "tax_class",
    "precare_allowance",
    "taxable_base",
    "annual_withholding_tax",
    "monthly_withholding_tax",
];

pub const HOUSEHOLD_COLUMNS: [&str; 5] = [
    "household_id",
    "residual_need",
    "housing_precedence",
    "child_supplement_precedence",
    "combined_precedence",
];

/// A single row of the person result table.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PersonRow {
    pub person_id: PersonId,
    pub tax_class: u8,
    pub precare_allowance: Decimal,
    pub taxable_base: Decimal,
    pub annual_withholding_tax: Decimal,
    pub monthly_withholding_tax: Decimal,
}

/// A single row of the household result table.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HouseholdRow {
    pub household_id: HouseholdId,
    pub residual_need: Decimal,
    pub housing_precedence: bool,
    pub child_supplement_precedence: bool,
    pub combined_precedence: bool,
}

/// Rounds to cents and always shows two decimal places.
fn cents(value: Decimal) -> Decimal {
    let mut rounded = round_half_up(value);
    rounded.rescale(2);
    rounded
}

impl From<&PersonResult> for PersonRow {
    fn from(result: &PersonResult) -> Self {
        let withholding = &result.withholding;
        PersonRow {
            person_id: result.person_id,
            tax_class: withholding.tax_class.code(),
            precare_allowance: cents(withholding.precare_allowance.total()),
            taxable_base: cents(withholding.taxable_base),
            annual_withholding_tax: cents(withholding.annual_tax),
            monthly_withholding_tax: cents(withholding.monthly_tax()),
        }
    }
}

impl From<&HouseholdResult> for HouseholdRow {
    fn from(result: &HouseholdResult) -> Self {
        HouseholdRow {
            household_id: result.household_id,
            residual_need: cents(result.flags.residual_need),
            housing_precedence: result.flags.housing,
            child_supplement_precedence: result.flags.child_supplement,
            combined_precedence: result.flags.combined,
        }
    }
}

/// Writes the person result table with a header row.
pub fn write_person_results<W: Write>(
    writer: W,
    results: &[PersonResult],
) -> Result<(), ReportError> {
    write_table(writer, &PERSON_COLUMNS, results.iter().map(PersonRow::from))
}

/// Writes the household result table with a header row.
pub fn write_household_results<W: Write>(
    writer: W,
    results: &[HouseholdResult],
) -> Result<(), ReportError> {
    write_table(writer, &HOUSEHOLD_COLUMNS, results.iter().map(HouseholdRow::from))
}

/// Serializes `rows`; the header comes from the first row, or from
/// `columns` when there are no rows.
fn write_table<W, T>(
    writer: W,
    columns: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> Result<(), ReportError>
where
    W: Write,
    T: Serialize,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut written = 0usize;
    for row in rows {
        csv_writer.serialize(row)?;
        written += 1;
    }
    if written == 0 {
        csv_writer.write_record(columns)?;
    }
    csv_writer.flush()?;
    Ok(())
}
