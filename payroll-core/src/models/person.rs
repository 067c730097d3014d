use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::TaxClass;

pub type PersonId = u64;
pub type AssessmentUnitId = u64;
pub type HouseholdId = u64;

/// One employee of the simulated population.
///
/// All amounts are monthly. The three contribution fields are computed by
/// the social-insurance collaborators; `None` means "not supplied" and is
/// treated as zero wherever it is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub person_id: PersonId,
    pub assessment_unit_id: AssessmentUnitId,
    pub household_id: HouseholdId,
    pub gross_wage_m: Decimal,
    pub joint_assessment: bool,
    pub single_parent: bool,

    // Collaborator-supplied contributions (regular employment)
    pub pension_contribution_m: Option<Decimal>,
    pub health_contribution_m: Option<Decimal>,
    pub care_contribution_m: Option<Decimal>,
}

/// A person together with the withholding class assigned to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedPerson<'a> {
    pub person: &'a Person,
    pub tax_class: TaxClass,
}
