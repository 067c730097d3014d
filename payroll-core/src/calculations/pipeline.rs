//! Whole-population run of both calculation chains.
//!
//! The withholding chain needs every assessment unit aggregated before any
//! person is classified, so the run is split into a class-assignment pass
//! over the full population followed by a per-person withholding pass.
//! Households are resolved independently of the tax chain; they only
//! borrow the member count and summed withholding tax for reporting.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::calculations::benefit_priority::{BenefitPriorityResolver, PrecedenceFlags};
use crate::calculations::tax_class::{TaxClassAssigner, TaxClassError};
use crate::calculations::withholding::{
    WithholdingError, WithholdingTaxCalculator, WithholdingTaxResult,
};
use crate::models::{
    AssessmentUnitId, Household, HouseholdId, ParameterSet, Person, PersonId, TaxClass,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("tax class assignment failed: {0}")]
    TaxClass(#[from] TaxClassError),

    #[error("withholding calculation failed: {0}")]
    Withholding(#[from] WithholdingError),

    #[error("person {0} appears more than once")]
    DuplicatePerson(PersonId),

    #[error("household {0} appears more than once")]
    DuplicateHousehold(HouseholdId),

    #[error("person {person_id} references unknown household {household_id}")]
    UnknownHousehold {
        person_id: PersonId,
        household_id: HouseholdId,
    },

    #[error("household {0} has no members")]
    EmptyHousehold(HouseholdId),
}

/// Per-person output of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonResult {
    pub person_id: PersonId,
    pub assessment_unit_id: AssessmentUnitId,
    pub household_id: HouseholdId,
    pub withholding: WithholdingTaxResult,
}

/// Per-household output of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdResult {
    pub household_id: HouseholdId,
    pub member_count: usize,
    /// Sum of the members' annual withholding tax.
    pub annual_withholding_tax: Decimal,
    pub flags: PrecedenceFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub persons: Vec<PersonResult>,
    pub households: Vec<HouseholdResult>,
}

impl PipelineOutput {
    /// Number of persons per assigned class.
    pub fn class_counts(&self) -> BTreeMap<TaxClass, usize> {
        let mut counts = BTreeMap::new();
        for person in &self.persons {
            *counts.entry(person.withholding.tax_class).or_insert(0) += 1;
        }
        counts
    }

    pub fn total_annual_withholding_tax(&self) -> Decimal {
        self.persons
            .iter()
            .map(|p| p.withholding.annual_tax)
            .sum()
    }
}

/// Runs both chains for one parameter year.
#[derive(Debug, Clone)]
pub struct Pipeline<'a> {
    assigner: TaxClassAssigner,
    withholding: WithholdingTaxCalculator<'a>,
    resolver: BenefitPriorityResolver,
}

impl<'a> Pipeline<'a> {
    pub fn new(params: &'a ParameterSet) -> Result<Self, PipelineError> {
        Ok(Self {
            assigner: TaxClassAssigner::from_parameters(params),
            withholding: WithholdingTaxCalculator::new(params)?,
            resolver: BenefitPriorityResolver::new(),
        })
    }

    /// Processes a population.
    ///
    /// Person results keep the order of `persons`, household results the
    /// order of `households`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for duplicate ids, persons pointing at a
    /// missing household, households without members, or a failure in one of
    /// the calculators.
    pub fn run(
        &self,
        persons: &[Person],
        households: &[Household],
    ) -> Result<PipelineOutput, PipelineError> {
        let members = check_membership(persons, households)?;

        // Phase one: classes for the whole population.
        let classified = self.assigner.assign(persons)?;

        // Phase two: per-person withholding.
        let person_results = classified
            .iter()
            .map(|c| {
                Ok(PersonResult {
                    person_id: c.person.person_id,
                    assessment_unit_id: c.person.assessment_unit_id,
                    household_id: c.person.household_id,
                    withholding: self.withholding.calculate(c.person, c.tax_class)?,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let mut tax_by_household: HashMap<HouseholdId, Decimal> = HashMap::new();
        for result in &person_results {
            *tax_by_household.entry(result.household_id).or_default() +=
                result.withholding.annual_tax;
        }

        let household_results: Vec<HouseholdResult> = households
            .iter()
            .map(|h| HouseholdResult {
                household_id: h.household_id,
                member_count: members[&h.household_id],
                annual_withholding_tax: tax_by_household
                    .get(&h.household_id)
                    .copied()
                    .unwrap_or_default(),
                flags: self.resolver.resolve(h),
            })
            .collect();

        let output = PipelineOutput {
            persons: person_results,
            households: household_results,
        };
        log_summary(&output);
        Ok(output)
    }
}

/// Validates ids and counts the members of every household.
fn check_membership(
    persons: &[Person],
    households: &[Household],
) -> Result<HashMap<HouseholdId, usize>, PipelineError> {
    let mut members: HashMap<HouseholdId, usize> = HashMap::with_capacity(households.len());
    for household in households {
        if members.insert(household.household_id, 0).is_some() {
            return Err(PipelineError::DuplicateHousehold(household.household_id));
        }
    }

    let mut seen: HashSet<PersonId> = HashSet::with_capacity(persons.len());
    for person in persons {
        if !seen.insert(person.person_id) {
            return Err(PipelineError::DuplicatePerson(person.person_id));
        }
        let count = members
            .get_mut(&person.household_id)
            .ok_or(PipelineError::UnknownHousehold {
                person_id: person.person_id,
                household_id: person.household_id,
            })?;
        *count += 1;
    }

    if let Some(empty) = households.iter().find(|h| members[&h.household_id] == 0) {
        return Err(PipelineError::EmptyHousehold(empty.household_id));
    }

    Ok(members)
}

fn log_summary(output: &PipelineOutput) {
    let count_flags = |pick: fn(&PrecedenceFlags) -> bool| {
        output
            .households
            .iter()
            .filter(|h| pick(&h.flags))
            .count()
    };

    info!(
        persons = output.persons.len(),
        households = output.households.len(),
        classes = ?output.class_counts(),
        total_annual_tax = %output.total_annual_withholding_tax(),
        "withholding pass complete"
    );
    info!(
        housing = count_flags(|f| f.housing),
        child_supplement = count_flags(|f| f.child_supplement),
        combined = count_flags(|f| f.combined),
        "benefit precedence pass complete"
    );
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tracing_subscriber::fmt::format::FmtSpan;

    use super::*;
    use crate::models::parameter_fixtures::parameters_2021;

    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_span_events(FmtSpan::NONE)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn person(
        person_id: PersonId,
        assessment_unit_id: AssessmentUnitId,
        household_id: HouseholdId,
        gross_wage_m: Decimal,
        joint_assessment: bool,
    ) -> Person {
        Person {
            person_id,
            assessment_unit_id,
            household_id,
            gross_wage_m,
            joint_assessment,
            single_parent: false,
            pension_contribution_m: None,
            health_contribution_m: None,
            care_contribution_m: None,
        }
    }

    fn household(
        household_id: HouseholdId,
        housing_benefit: Decimal,
    ) -> Household {
        Household {
            household_id,
            subsistence_floor: dec!(1500),
            core_benefit_income: dec!(1000),
            child_benefit: dec!(219),
            advance_child_support: dec!(0),
            housing_benefit,
            child_supplement: dec!(0),
        }
    }

    fn couple() -> Vec<Person> {
        vec![
            person(1, 1, 1, dec!(4000), true),
            person(2, 1, 1, dec!(0), true),
        ]
    }

    // =========================================================================
    // run tests
    // =========================================================================

    #[test]
    fn run_classifies_then_taxes_single_earner_couple() {
        let _guard = init_test_tracing();
        let params = parameters_2021();
        let pipeline = Pipeline::new(&params).unwrap();

        let output = pipeline.run(&couple(), &[household(1, dec!(300))]).unwrap();

        assert_eq!(output.persons.len(), 2);
        assert_eq!(output.persons[0].withholding.tax_class, TaxClass::Three);
        assert_eq!(output.persons[1].withholding.tax_class, TaxClass::Five);
        // 48000 - 1036 - 3000 precare (class 3 ceiling), splitting tariff
        assert_eq!(output.persons[0].withholding.taxable_base, dec!(43964));
        assert_eq!(
            output.persons[0].withholding.annual_tax,
            dec!(5585.786108057)
        );
        assert_eq!(output.persons[1].withholding.annual_tax, dec!(0));
    }

    #[test]
    fn run_resolves_households_with_member_totals() {
        let params = parameters_2021();
        let pipeline = Pipeline::new(&params).unwrap();

        let output = pipeline.run(&couple(), &[household(1, dec!(300))]).unwrap();

        assert_eq!(
            output.households,
            vec![HouseholdResult {
                household_id: 1,
                member_count: 2,
                annual_withholding_tax: dec!(5585.786108057),
                flags: PrecedenceFlags {
                    residual_need: dec!(281),
                    housing: true,
                    child_supplement: false,
                    combined: true,
                },
            }]
        );
    }

    #[test]
    fn run_counts_classes() {
        let params = parameters_2021();
        let pipeline = Pipeline::new(&params).unwrap();
        let mut persons = couple();
        persons.push(person(3, 2, 1, dec!(2000), false));

        let output = pipeline.run(&persons, &[household(1, dec!(0))]).unwrap();
        let counts = output.class_counts();

        assert_eq!(counts[&TaxClass::One], 1);
        assert_eq!(counts[&TaxClass::Three], 1);
        assert_eq!(counts[&TaxClass::Five], 1);
        assert_eq!(counts.get(&TaxClass::Four), None);
    }

    #[test]
    fn run_handles_empty_population() {
        let params = parameters_2021();
        let pipeline = Pipeline::new(&params).unwrap();

        assert_eq!(pipeline.run(&[], &[]), Ok(PipelineOutput::default()));
    }

    // =========================================================================
    // membership errors
    // =========================================================================

    #[test]
    fn run_rejects_household_without_members() {
        let params = parameters_2021();
        let pipeline = Pipeline::new(&params).unwrap();

        let result = pipeline.run(&couple(), &[household(1, dec!(0)), household(2, dec!(0))]);

        assert_eq!(result, Err(PipelineError::EmptyHousehold(2)));
    }

    #[test]
    fn run_rejects_unknown_household() {
        let params = parameters_2021();
        let pipeline = Pipeline::new(&params).unwrap();
        let persons = vec![person(1, 1, 9, dec!(2000), false)];

        let result = pipeline.run(&persons, &[household(1, dec!(0))]);

        assert_eq!(
            result,
            Err(PipelineError::UnknownHousehold {
                person_id: 1,
                household_id: 9,
            })
        );
    }

    #[test]
    fn run_rejects_duplicate_ids() {
        let params = parameters_2021();
        let pipeline = Pipeline::new(&params).unwrap();
        let mut persons = couple();
        persons.push(person(2, 3, 1, dec!(100), false));

        assert_eq!(
            pipeline.run(&persons, &[household(1, dec!(0))]),
            Err(PipelineError::DuplicatePerson(2))
        );
        assert_eq!(
            pipeline.run(&couple(), &[household(1, dec!(0)), household(1, dec!(0))]),
            Err(PipelineError::DuplicateHousehold(1))
        );
    }
}
