//! Withholding-class assignment (§ 38b EStG).
//!
//! Assignment runs in two phases. First every assessment unit's wage range
//! is aggregated into an [`AssessmentUnit`]; only once all units are known is
//! each person classified against their unit:
//!
//! | Class | Condition |
//! |-------|-----------|
//! | 1     | not jointly assessed, not a single parent |
//! | 2     | single parent (wins over every other condition) |
//! | 3     | single-earner couple, own wage above the secondary-earner threshold |
//! | 4     | jointly assessed, not a single-earner couple |
//! | 5     | single-earner couple, own wage at or below the threshold |
//!
//! A *single-earner couple* is a jointly assessed unit whose lower wage does
//! not exceed the secondary-earner threshold while the higher wage is
//! positive. The threshold is `(basic allowance + work-expense allowance) / 12`,
//! i.e. the monthly wage below which no income tax would be due.

use std::collections::HashMap;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::calculations::common::MONTHS_PER_YEAR;
use crate::models::{
    AssessmentUnit, AssessmentUnitId, ClassifiedPerson, ParameterSet, Person, PersonId, TaxClass,
};

/// Errors raised by the class assignment. All of them are caller contract
/// violations; valid input never produces one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaxClassError {
    #[error("assessment unit {0} has no members")]
    EmptyAssessmentUnit(AssessmentUnitId),

    #[error("person {person_id} belongs to unit {expected}, not unit {found}")]
    UnitMismatch {
        person_id: PersonId,
        expected: AssessmentUnitId,
        found: AssessmentUnitId,
    },

    #[error("no tax class condition holds for person {0}")]
    NoMatchingClass(PersonId),

    #[error("person {person_id} satisfies several tax class conditions: {candidates:?}")]
    AmbiguousClass {
        person_id: PersonId,
        candidates: Vec<TaxClass>,
    },
}

/// The five class conditions evaluated independently for one person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassConditions {
    pub one: bool,
    pub two: bool,
    pub three: bool,
    pub four: bool,
    pub five: bool,
}

impl ClassConditions {
    /// Classes whose condition holds.
    pub fn matching(&self) -> Vec<TaxClass> {
        [
            (self.one, TaxClass::One),
            (self.two, TaxClass::Two),
            (self.three, TaxClass::Three),
            (self.four, TaxClass::Four),
            (self.five, TaxClass::Five),
        ]
        .into_iter()
        .filter_map(|(holds, class)| holds.then_some(class))
        .collect()
    }

    fn resolve(
        &self,
        person_id: PersonId,
    ) -> Result<TaxClass, TaxClassError> {
        match self.matching().as_slice() {
            [class] => Ok(*class),
            [] => Err(TaxClassError::NoMatchingClass(person_id)),
            candidates => Err(TaxClassError::AmbiguousClass {
                person_id,
                candidates: candidates.to_vec(),
            }),
        }
    }
}

/// Assigns statutory withholding classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxClassAssigner {
    secondary_earner_threshold: Decimal,
}

impl TaxClassAssigner {
    /// Creates an assigner from the first taxed bracket's threshold and the
    /// annual work-expense allowance.
    pub fn new(
        first_bracket_threshold: Decimal,
        work_expense_allowance: Decimal,
    ) -> Self {
        Self {
            secondary_earner_threshold: (first_bracket_threshold + work_expense_allowance)
                / MONTHS_PER_YEAR,
        }
    }

    pub fn from_parameters(params: &ParameterSet) -> Self {
        Self::new(
            params.first_bracket_threshold(),
            params.allowances().work_expense,
        )
    }

    /// Monthly wage at or below which a partner counts as non-earning.
    pub fn secondary_earner_threshold(&self) -> Decimal {
        self.secondary_earner_threshold
    }

    /// Phase one: aggregates wage extremes per assessment unit.
    pub fn assessment_units(persons: &[Person]) -> HashMap<AssessmentUnitId, AssessmentUnit> {
        let mut units: HashMap<AssessmentUnitId, AssessmentUnit> = HashMap::new();
        for person in persons {
            units
                .entry(person.assessment_unit_id)
                .and_modify(|unit| unit.include(person.gross_wage_m))
                .or_insert_with(|| {
                    AssessmentUnit::with_first_member(person.assessment_unit_id, person.gross_wage_m)
                });
        }
        debug!(
            persons = persons.len(),
            units = units.len(),
            "aggregated assessment units"
        );
        units
    }

    /// Whether `person`'s unit is a single-earner couple.
    pub fn is_single_earner_couple(
        &self,
        person: &Person,
        unit: &AssessmentUnit,
    ) -> bool {
        person.joint_assessment
            && unit.min_wage_m <= self.secondary_earner_threshold
            && unit.max_wage_m > Decimal::ZERO
    }

    /// Evaluates every class condition for `person` without choosing.
    ///
    /// Single-parent status takes precedence, so the couple classes require
    /// its absence.
    pub fn conditions(
        &self,
        person: &Person,
        unit: &AssessmentUnit,
    ) -> ClassConditions {
        let joint = person.joint_assessment;
        let single_parent = person.single_parent;
        let couple = self.is_single_earner_couple(person, unit);
        let above = person.gross_wage_m > self.secondary_earner_threshold;

        ClassConditions {
            one: !joint && !single_parent,
            two: single_parent,
            three: !single_parent && couple && above,
            four: !single_parent && joint && !couple,
            five: !single_parent && couple && !above,
        }
    }

    /// Classifies one person against their already aggregated unit.
    ///
    /// # Errors
    ///
    /// [`TaxClassError::UnitMismatch`] if `unit` is not the person's unit;
    /// [`TaxClassError::NoMatchingClass`] / [`TaxClassError::AmbiguousClass`]
    /// if the class conditions fail to partition (an internal invariant).
    pub fn classify(
        &self,
        person: &Person,
        unit: &AssessmentUnit,
    ) -> Result<TaxClass, TaxClassError> {
        if person.assessment_unit_id != unit.assessment_unit_id {
            return Err(TaxClassError::UnitMismatch {
                person_id: person.person_id,
                expected: person.assessment_unit_id,
                found: unit.assessment_unit_id,
            });
        }
        if unit.member_count == 0 {
            return Err(TaxClassError::EmptyAssessmentUnit(unit.assessment_unit_id));
        }
        self.conditions(person, unit).resolve(person.person_id)
    }

    /// Classifies a whole population, aggregating units first.
    ///
    /// Results are returned in input order.
    pub fn assign<'a>(
        &self,
        persons: &'a [Person],
    ) -> Result<Vec<ClassifiedPerson<'a>>, TaxClassError> {
        let units = Self::assessment_units(persons);

        persons
            .iter()
            .map(|person| {
                let unit = units
                    .get(&person.assessment_unit_id)
                    .ok_or(TaxClassError::EmptyAssessmentUnit(person.assessment_unit_id))?;
                Ok(ClassifiedPerson {
                    person,
                    tax_class: self.classify(person, unit)?,
                })
            })
            .collect()
    }
}
