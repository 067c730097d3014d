//! Annual withholding tax (Lohnsteuer, § 39b EStG).
//!
//! # Taxable base
//!
//! ```text
//! max(0, 12 × gross wage
//!        − work-expense allowance      (not for class 6)
//!        − special-expense allowance   (not for class 6)
//!        − single-parent relief        (class 2 only)
//!        − precare allowance)
//! ```
//!
//! # Tariff application
//!
//! | Class   | Tax |
//! |---------|-----|
//! | 1, 2, 4 | `T(base)` |
//! | 3       | `2 × T(base / 2)` (splitting) |
//! | 5, 6    | `max(2 × (T(1.25 × base) − T(0.75 × base)), base × entry rate)` |
//!
//! The floor for classes 5 and 6 keeps their effective rate from dropping
//! below the entry rate of the first taxed bracket.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use payroll_core::calculations::{TariffSpec, WithholdingTaxCalculator};
//! use payroll_core::{Allowances, HealthAllowanceRules, ParameterSet, TaxClass};
//!
//! let params = ParameterSet::new(
//!     NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
//!     TariffSpec::from_continuity(
//!         vec![dec!(0), dec!(10000)],
//!         vec![vec![dec!(0)], vec![dec!(0.25)]],
//!         dec!(0),
//!     )
//!     .unwrap(),
//!     TariffSpec::from_parts(vec![dec!(2005)], vec![vec![dec!(0)]], vec![dec!(1)]).unwrap(),
//!     Allowances {
//!         work_expense: dec!(1000),
//!         special_expense: dec!(0),
//!         single_parent_relief: dec!(0),
//!     },
//!     HealthAllowanceRules {
//!         min_share: dec!(0),
//!         ceiling_single_earner_couple: dec!(0),
//!         ceiling_other: dec!(0),
//!     },
//! )
//! .unwrap();
//!
//! let calculator = WithholdingTaxCalculator::new(&params).unwrap();
//!
//! // 12 × 2000 − 1000 = 23000; 0.25 × (23000 − 10000) = 3250
//! assert_eq!(calculator.tariff_tax(dec!(23000), TaxClass::One).unwrap(), dec!(3250));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::calculations::common::{MONTHS_PER_YEAR, annualize, floor_at_zero};
use crate::calculations::precare::{PrecareAllowance, PrecareAllowanceCalculator};
use crate::calculations::tariff::TariffError;
use crate::models::{ParameterSet, Person, TaxClass};

/// Errors that can occur during withholding-tax calculations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WithholdingError {
    #[error("tariff evaluation failed: {0}")]
    Tariff(#[from] TariffError),
}

/// Result of the withholding calculation for one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithholdingTaxResult {
    pub tax_class: TaxClass,
    pub precare_allowance: PrecareAllowance,
    pub taxable_base: Decimal,

    /// Annual withholding tax, unrounded.
    pub annual_tax: Decimal,
}

impl WithholdingTaxResult {
    /// Monthly withholding tax, unrounded.
    pub fn monthly_tax(&self) -> Decimal {
        self.annual_tax / MONTHS_PER_YEAR
    }
}

/// Calculator bound to one [`ParameterSet`].
#[derive(Debug, Clone)]
pub struct WithholdingTaxCalculator<'a> {
    params: &'a ParameterSet,
    precare: PrecareAllowanceCalculator<'a>,
}

impl<'a> WithholdingTaxCalculator<'a> {
    pub fn new(params: &'a ParameterSet) -> Result<Self, WithholdingError> {
        Ok(Self {
            params,
            precare: PrecareAllowanceCalculator::new(params)?,
        })
    }

    /// Calculates the annual withholding tax of a classified person.
    pub fn calculate(
        &self,
        person: &Person,
        tax_class: TaxClass,
    ) -> Result<WithholdingTaxResult, WithholdingError> {
        let precare_allowance = self.precare.calculate(person, tax_class);
        let taxable_base =
            self.taxable_base(person.gross_wage_m, tax_class, precare_allowance.total());
        let annual_tax = self.tariff_tax(taxable_base, tax_class)?;

        Ok(WithholdingTaxResult {
            tax_class,
            precare_allowance,
            taxable_base,
            annual_tax,
        })
    }

    /// Annual taxable base, never negative.
    pub fn taxable_base(
        &self,
        gross_wage_m: Decimal,
        tax_class: TaxClass,
        precare_allowance: Decimal,
    ) -> Decimal {
        let allowances = self.params.allowances();
        let (work_expense, special_expense) = if tax_class.is_secondary_employment() {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            (allowances.work_expense, allowances.special_expense)
        };
        let single_parent_relief = match tax_class {
            TaxClass::Two => allowances.single_parent_relief,
            _ => Decimal::ZERO,
        };

        let base = annualize(gross_wage_m)
            - work_expense
            - special_expense
            - single_parent_relief
            - precare_allowance;
        if base < Decimal::ZERO {
            if gross_wage_m > Decimal::ZERO {
                warn!(
                    %base,
                    %gross_wage_m,
                    %tax_class,
                    "allowances exceed wage; taxable base floored"
                );
            } else {
                debug!(%base, %tax_class, "no wage; taxable base floored");
            }
        }
        floor_at_zero(base)
    }

    /// Applies the class-specific tariff variant to a taxable base.
    pub fn tariff_tax(
        &self,
        taxable_base: Decimal,
        tax_class: TaxClass,
    ) -> Result<Decimal, TariffError> {
        match tax_class {
            TaxClass::One | TaxClass::Two | TaxClass::Four => self.basic_tariff(taxable_base),
            TaxClass::Three => self.splitting_tariff(taxable_base),
            TaxClass::Five | TaxClass::Six => self.secondary_tariff(taxable_base),
        }
    }

    fn basic_tariff(
        &self,
        taxable_base: Decimal,
    ) -> Result<Decimal, TariffError> {
        self.params.base_tariff().evaluate(taxable_base)
    }

    fn splitting_tariff(
        &self,
        taxable_base: Decimal,
    ) -> Result<Decimal, TariffError> {
        Ok(Decimal::TWO * self.basic_tariff(taxable_base / Decimal::TWO)?)
    }

    fn secondary_tariff(
        &self,
        taxable_base: Decimal,
    ) -> Result<Decimal, TariffError> {
        let upper = taxable_base * Decimal::new(125, 2);
        let lower = taxable_base * Decimal::new(75, 2);
        let taxes = self.params.base_tariff().evaluate_many(&[upper, lower])?;

        let double_difference = Decimal::TWO * (taxes[0] - taxes[1]);
        let minimum = taxable_base * self.params.first_bracket_rate();
        Ok(double_difference.max(minimum))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::parameter_fixtures::{parameters_2021, parameters_for};

    fn person(gross_wage_m: Decimal) -> Person {
        Person {
            person_id: 1,
            assessment_unit_id: 1,
            household_id: 1,
            gross_wage_m,
            joint_assessment: false,
            single_parent: false,
            pension_contribution_m: None,
            health_contribution_m: None,
            care_contribution_m: None,
        }
    }

    // =========================================================================
    // taxable_base tests
    // =========================================================================

    #[test]
    fn taxable_base_subtracts_flat_allowances() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        let base = calculator.taxable_base(dec!(3000), TaxClass::One, dec!(6115.32));

        // 36000 - 1000 - 36 - 6115.32
        assert_eq!(base, dec!(28848.68));
    }

    #[test]
    fn taxable_base_applies_single_parent_relief_only_in_class_two() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        let class_two = calculator.taxable_base(dec!(2500), TaxClass::Two, dec!(1900));
        let class_one = calculator.taxable_base(dec!(2500), TaxClass::One, dec!(1900));

        assert_eq!(class_two, dec!(23056));
        assert_eq!(class_one, dec!(27064));
    }

    #[test]
    fn taxable_base_class_six_gets_no_flat_allowances() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        let base = calculator.taxable_base(dec!(1000), TaxClass::Six, dec!(0));

        assert_eq!(base, dec!(12000));
    }

    /// Runs `f` under a WARN-level subscriber and returns what it logged.
    fn captured_warnings(f: impl FnOnce()) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || SharedBuffer(Arc::clone(&sink)))
            .finish();

        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn taxable_base_without_wage_floors_silently() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        let logs = captured_warnings(|| {
            assert_eq!(calculator.taxable_base(dec!(0), TaxClass::Five, dec!(0)), dec!(0));
        });

        assert_eq!(logs, "");
    }

    #[test]
    fn taxable_base_warns_when_allowances_exceed_wage() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        let logs = captured_warnings(|| {
            assert_eq!(calculator.taxable_base(dec!(50), TaxClass::One, dec!(72)), dec!(0));
        });

        assert!(logs.contains("taxable base floored"), "got: {logs}");
    }

    #[test]
    fn taxable_base_is_floored_at_zero() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        assert_eq!(calculator.taxable_base(dec!(50), TaxClass::One, dec!(72)), dec!(0));
    }

    // =========================================================================
    // tariff_tax regression fixtures (2021 tariff)
    // =========================================================================

    #[test]
    fn class_one_applies_basic_tariff() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        assert_eq!(
            calculator.tariff_tax(dec!(30000), TaxClass::One),
            Ok(dec!(5091.1816022965))
        );
    }

    #[test]
    fn class_three_applies_splitting_tariff() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        // 2 * T(21982)
        assert_eq!(
            calculator.tariff_tax(dec!(43964), TaxClass::Three),
            Ok(dec!(5585.786108057))
        );
    }

    #[test]
    fn class_five_uses_double_difference_above_floor() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        // 2 * (T(25000) - T(15000)) = 2 * (3626.4605072965 - 1010.2933172965)
        assert_eq!(
            calculator.tariff_tax(dec!(20000), TaxClass::Five),
            Ok(dec!(5232.33438))
        );
    }

    #[test]
    fn class_five_floor_binds_for_small_base() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        // 2 * (T(10000) - T(6000)) ≈ 72.98 < 8000 * 0.14
        assert_eq!(
            calculator.tariff_tax(dec!(8000), TaxClass::Five),
            Ok(dec!(1120))
        );
        assert_eq!(
            calculator.tariff_tax(dec!(8000), TaxClass::Six),
            Ok(dec!(1120))
        );
    }

    #[test]
    fn zero_base_yields_zero_tax_for_every_class() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();

        for class in TaxClass::ASSIGNABLE {
            assert_eq!(calculator.tariff_tax(dec!(0), class), Ok(dec!(0)));
        }
    }

    // =========================================================================
    // calculate tests
    // =========================================================================

    #[test]
    fn calculate_full_chain_for_single_employee() {
        let params = parameters_2021();
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();
        let mut employee = person(dec!(3000));
        employee.pension_contribution_m = Some(dec!(279));
        employee.health_contribution_m = Some(dec!(229.50));
        employee.care_contribution_m = Some(dec!(45.75));

        let result = calculator.calculate(&employee, TaxClass::One).unwrap();

        assert_eq!(result.precare_allowance.total(), dec!(6115.32));
        assert_eq!(result.taxable_base, dec!(28848.68));
        assert_eq!(result.annual_tax, dec!(4744.6547905524224));
    }

    #[test]
    fn calculate_before_2010_ignores_contributions() {
        let params = parameters_for(NaiveDate::from_ymd_opt(2009, 1, 1).unwrap());
        let calculator = WithholdingTaxCalculator::new(&params).unwrap();
        let mut employee = person(dec!(2500));
        employee.pension_contribution_m = Some(dec!(250));

        let result = calculator.calculate(&employee, TaxClass::One).unwrap();

        assert_eq!(result.precare_allowance.total(), dec!(0));
        assert_eq!(result.taxable_base, dec!(28964));
    }

    #[test]
    fn monthly_tax_is_a_twelfth() {
        let result = WithholdingTaxResult {
            tax_class: TaxClass::One,
            precare_allowance: PrecareAllowance::default(),
            taxable_base: dec!(0),
            annual_tax: dec!(1200),
        };

        assert_eq!(result.monthly_tax(), dec!(100));
    }

    // =========================================================================
    // properties
    // =========================================================================

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn secondary_classes_never_fall_below_entry_rate(base in 0u32..300_000) {
            let params = parameters_2021();
            let calculator = WithholdingTaxCalculator::new(&params).unwrap();
            let base = Decimal::from(base);

            for class in [TaxClass::Five, TaxClass::Six] {
                let tax = calculator.tariff_tax(base, class).unwrap();
                prop_assert!(tax >= base * params.first_bracket_rate());
            }
        }

        #[test]
        fn class_three_is_twice_tariff_of_half(base in 0u32..600_000) {
            let params = parameters_2021();
            let calculator = WithholdingTaxCalculator::new(&params).unwrap();
            let base = Decimal::from(base);

            let splitting = calculator.tariff_tax(base, TaxClass::Three).unwrap();
            let half = params.base_tariff().evaluate(base / Decimal::TWO).unwrap();

            prop_assert_eq!(splitting, Decimal::TWO * half);
        }

        #[test]
        fn tax_is_never_negative(wage in 0u32..20_000) {
            let params = parameters_2021();
            let calculator = WithholdingTaxCalculator::new(&params).unwrap();

            for class in TaxClass::ASSIGNABLE {
                let result = calculator.calculate(&person(Decimal::from(wage)), class).unwrap();
                prop_assert!(result.taxable_base >= Decimal::ZERO);
                prop_assert!(result.annual_tax >= Decimal::ZERO);
            }
        }
    }
}
