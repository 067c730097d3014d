//! Precare allowance (Vorsorgepauschale) for withholding purposes.
//!
//! Before 2010 the allowance is not part of the withholding calculation. From
//! 2010 on it is the sum of
//!
//! 1. the deductible share of the regular-job pension contribution, where the
//!    share is looked up by calendar year in the pension-share schedule
//!    (§ 39b (2) Nr. 3a EStG), and
//! 2. the larger of two health/care options (§ 39b (2) Nr. 3b EStG):
//!    a minimum share of gross wage capped by a class-dependent ceiling, or
//!    the actual contributions at the withholding rate.
//!
//! Contributions that were not supplied count as zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculations::common::annualize;
use crate::calculations::tariff::TariffError;
use crate::models::{ParameterSet, Person, TaxClass};

/// Annual precare allowance with its two components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrecareAllowance {
    /// Deductible part of the pension contribution.
    pub pension_part: Decimal,

    /// Larger of the two health/care options.
    pub health_care_part: Decimal,
}

impl PrecareAllowance {
    pub fn total(&self) -> Decimal {
        self.pension_part + self.health_care_part
    }
}

/// Which allowance rules apply for the parameter year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecareRegime {
    /// Before 2010: no allowance.
    NotInForce,
    /// From 2010: pension share plus health/care deduction.
    Since2010 { pension_share: Decimal },
}

/// Calculator bound to one [`ParameterSet`].
#[derive(Debug, Clone)]
pub struct PrecareAllowanceCalculator<'a> {
    params: &'a ParameterSet,
    regime: PrecareRegime,
}

impl<'a> PrecareAllowanceCalculator<'a> {
    /// Selects the regime for the parameter year and, from 2010 on, looks up
    /// the pension share once.
    ///
    /// # Errors
    ///
    /// Returns [`TariffError`] if the pension-share schedule does not cover
    /// the year. A validated [`ParameterSet`] never triggers this.
    pub fn new(params: &'a ParameterSet) -> Result<Self, TariffError> {
        let regime = if params.precare_allowance_in_force() {
            let pension_share = params
                .pension_share()
                .evaluate(Decimal::from(params.year()))?;
            PrecareRegime::Since2010 { pension_share }
        } else {
            PrecareRegime::NotInForce
        };
        debug!(year = params.year(), ?regime, "selected precare allowance regime");

        Ok(Self { params, regime })
    }

    pub fn regime(&self) -> PrecareRegime {
        self.regime
    }

    /// Calculates the annual allowance for one person.
    pub fn calculate(
        &self,
        person: &Person,
        tax_class: TaxClass,
    ) -> PrecareAllowance {
        match self.regime {
            PrecareRegime::NotInForce => PrecareAllowance::default(),
            PrecareRegime::Since2010 { pension_share } => PrecareAllowance {
                pension_part: self.pension_part(person.pension_contribution_m, pension_share),
                health_care_part: self
                    .health_option_a(person.gross_wage_m, tax_class)
                    .max(self.health_option_b(
                        person.health_contribution_m,
                        person.care_contribution_m,
                    )),
            },
        }
    }

    /// `12 × pension contribution × share`.
    fn pension_part(
        &self,
        pension_contribution_m: Option<Decimal>,
        pension_share: Decimal,
    ) -> Decimal {
        annualize(pension_contribution_m.unwrap_or_default()) * pension_share
    }

    /// Minimum share of annual gross wage, capped at the class ceiling.
    fn health_option_a(
        &self,
        gross_wage_m: Decimal,
        tax_class: TaxClass,
    ) -> Decimal {
        let health = self.params.health();
        (health.min_share * annualize(gross_wage_m)).min(health.ceiling_for(tax_class))
    }

    /// Actual annual health and long-term-care contributions.
    fn health_option_b(
        &self,
        health_contribution_m: Option<Decimal>,
        care_contribution_m: Option<Decimal>,
    ) -> Decimal {
        annualize(health_contribution_m.unwrap_or_default() + care_contribution_m.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::parameter_fixtures::{parameters_2021, parameters_for};

    fn employee(gross_wage_m: Decimal) -> Person {
        Person {
            person_id: 1,
            assessment_unit_id: 1,
            household_id: 1,
            gross_wage_m,
            joint_assessment: false,
            single_parent: false,
            pension_contribution_m: Some(dec!(279)),
            health_contribution_m: Some(dec!(229.50)),
            care_contribution_m: Some(dec!(45.75)),
        }
    }

    // =========================================================================
    // regime selection tests
    // =========================================================================

    #[test]
    fn regime_before_2010_is_not_in_force() {
        let params = parameters_for(NaiveDate::from_ymd_opt(2009, 1, 1).unwrap());
        let calculator = PrecareAllowanceCalculator::new(&params).unwrap();

        assert_eq!(calculator.regime(), PrecareRegime::NotInForce);
        assert_eq!(
            calculator.calculate(&employee(dec!(3000)), TaxClass::One),
            PrecareAllowance::default()
        );
    }

    #[test]
    fn regime_2010_starts_at_forty_percent() {
        let params = parameters_for(NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
        let calculator = PrecareAllowanceCalculator::new(&params).unwrap();

        assert_eq!(
            calculator.regime(),
            PrecareRegime::Since2010 {
                pension_share: dec!(0.40)
            }
        );
    }

    #[test]
    fn regime_2021_uses_eighty_four_percent() {
        let params = parameters_2021();
        let calculator = PrecareAllowanceCalculator::new(&params).unwrap();

        assert_eq!(
            calculator.regime(),
            PrecareRegime::Since2010 {
                pension_share: dec!(0.84)
            }
        );
    }

    // =========================================================================
    // calculate tests
    // =========================================================================

    #[test]
    fn calculate_prefers_actual_contributions_when_larger() {
        let params = parameters_2021();
        let calculator = PrecareAllowanceCalculator::new(&params).unwrap();

        let allowance = calculator.calculate(&employee(dec!(3000)), TaxClass::One);

        // 12 * 279 * 0.84
        assert_eq!(allowance.pension_part, dec!(2812.32));
        // max(min(4320, 1900), 12 * 275.25)
        assert_eq!(allowance.health_care_part, dec!(3303));
        assert_eq!(allowance.total(), dec!(6115.32));
    }

    #[test]
    fn calculate_caps_option_a_at_class_three_ceiling() {
        let params = parameters_2021();
        let calculator = PrecareAllowanceCalculator::new(&params).unwrap();
        let mut person = employee(dec!(4000));
        person.pension_contribution_m = None;
        person.health_contribution_m = None;
        person.care_contribution_m = None;

        let class_three = calculator.calculate(&person, TaxClass::Three);
        let class_four = calculator.calculate(&person, TaxClass::Four);

        assert_eq!(class_three.total(), dec!(3000));
        assert_eq!(class_four.total(), dec!(1900));
    }

    #[test]
    fn calculate_option_a_below_ceiling_for_low_wage() {
        let params = parameters_2021();
        let calculator = PrecareAllowanceCalculator::new(&params).unwrap();
        let mut person = employee(dec!(1000));
        person.health_contribution_m = None;
        person.care_contribution_m = None;
        person.pension_contribution_m = None;

        // 0.12 * 12000 = 1440 < 1900
        assert_eq!(
            calculator.calculate(&person, TaxClass::One).health_care_part,
            dec!(1440)
        );
    }

    #[test]
    fn calculate_treats_missing_inputs_as_zero() {
        let params = parameters_2021();
        let calculator = PrecareAllowanceCalculator::new(&params).unwrap();
        let mut person = employee(dec!(0));
        person.pension_contribution_m = None;
        person.health_contribution_m = Some(dec!(10));
        person.care_contribution_m = None;

        let allowance = calculator.calculate(&person, TaxClass::Five);

        assert_eq!(allowance.pension_part, dec!(0));
        assert_eq!(allowance.health_care_part, dec!(120));
    }

    #[test]
    fn calculate_zero_wage_without_contributions_is_zero() {
        let params = parameters_2021();
        let calculator = PrecareAllowanceCalculator::new(&params).unwrap();
        let mut person = employee(dec!(0));
        person.pension_contribution_m = None;
        person.health_contribution_m = None;
        person.care_contribution_m = None;

        assert_eq!(calculator.calculate(&person, TaxClass::Five).total(), dec!(0));
    }
}
