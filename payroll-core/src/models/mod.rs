mod assessment_unit;
mod household;
mod parameter_set;
mod person;
mod tax_class;

pub use assessment_unit::AssessmentUnit;
pub use household::Household;
pub use parameter_set::{
    Allowances, HealthAllowanceRules, PRECARE_ALLOWANCE_FIRST_YEAR, ParameterError, ParameterSet,
};
pub use person::{AssessmentUnitId, ClassifiedPerson, HouseholdId, Person, PersonId};
pub use tax_class::{InvalidTaxClass, TaxClass};

#[cfg(test)]
pub(crate) use parameter_set::tests as parameter_fixtures;
