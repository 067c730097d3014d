use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::tariff::{TariffError, TariffSpec};
use crate::models::TaxClass;

/// First calendar year in which the withholding precare allowance applies.
pub const PRECARE_ALLOWANCE_FIRST_YEAR: i32 = 2010;

/// Errors detected while assembling a [`ParameterSet`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("invalid pension-share schedule: {0}")]
    PensionShare(#[source] TariffError),

    /// The class assignment and the class 5/6 floor need a first taxed
    /// bracket after the zero-rate bracket.
    #[error("base tariff needs at least two brackets, got {0}")]
    MissingTaxedBracket(usize),

    /// Taxable bases start at zero, so the tariff must be defined there.
    #[error("base tariff must start at or below zero, starts at {0}")]
    BaseTariffStartsAboveZero(Decimal),

    #[error("base tariff has no linear rate in its first taxed bracket")]
    MissingLinearRate,

    #[error("{name} must not be negative, got {value}")]
    NegativeAmount { name: &'static str, value: Decimal },

    #[error("{name} must be between 0 and 1, got {value}")]
    ShareOutOfRange { name: &'static str, value: Decimal },
}

/// Flat annual deductions from the withholding tax base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowances {
    /// Werbungskostenpauschale.
    pub work_expense: Decimal,
    /// Sonderausgabenpauschbetrag.
    pub special_expense: Decimal,
    /// Entlastungsbetrag für Alleinerziehende, class 2 only.
    pub single_parent_relief: Decimal,
}

/// Parameters of the health/care part of the precare allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAllowanceRules {
    /// Minimum share of annual gross wage (option A).
    pub min_share: Decimal,
    /// Annual ceiling of option A for class 3.
    pub ceiling_single_earner_couple: Decimal,
    /// Annual ceiling of option A for every other class.
    pub ceiling_other: Decimal,
}

impl HealthAllowanceRules {
    pub fn ceiling_for(
        &self,
        tax_class: TaxClass,
    ) -> Decimal {
        match tax_class {
            TaxClass::Three => self.ceiling_single_earner_couple,
            _ => self.ceiling_other,
        }
    }
}

/// The statutory parameters of one simulated tax year.
///
/// Built once through [`ParameterSet::new`], which performs every check;
/// afterwards the set is read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSet {
    effective_date: NaiveDate,
    base_tariff: TariffSpec,
    pension_share: TariffSpec,
    allowances: Allowances,
    health: HealthAllowanceRules,
    first_bracket_threshold: Decimal,
    first_bracket_rate: Decimal,
}

impl ParameterSet {
    /// Validates and assembles a parameter set.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError`] if the base tariff lacks a first taxed
    /// bracket or does not cover zero, an amount is negative, a share lies
    /// outside `[0, 1]`, or (from 2010 on) the pension-share schedule cannot
    /// be evaluated for the effective year.
    pub fn new(
        effective_date: NaiveDate,
        base_tariff: TariffSpec,
        pension_share: TariffSpec,
        allowances: Allowances,
        health: HealthAllowanceRules,
    ) -> Result<Self, ParameterError> {
        let bracket_count = base_tariff.brackets().len();
        let first_bracket_threshold = base_tariff
            .threshold(1)
            .ok_or(ParameterError::MissingTaxedBracket(bracket_count))?;
        let first_bracket_rate = base_tariff
            .linear_rate(1)
            .ok_or(ParameterError::MissingLinearRate)?;
        if base_tariff.first_threshold() > Decimal::ZERO {
            return Err(ParameterError::BaseTariffStartsAboveZero(
                base_tariff.first_threshold(),
            ));
        }

        check_non_negative("work_expense_allowance", allowances.work_expense)?;
        check_non_negative("special_expense_allowance", allowances.special_expense)?;
        check_non_negative("single_parent_relief", allowances.single_parent_relief)?;
        check_non_negative(
            "health_ceiling.single_earner_couple",
            health.ceiling_single_earner_couple,
        )?;
        check_non_negative("health_ceiling.other", health.ceiling_other)?;
        check_share("min_health_share", health.min_share)?;
        check_share("first_bracket_rate", first_bracket_rate)?;

        if effective_date.year() >= PRECARE_ALLOWANCE_FIRST_YEAR {
            let share = pension_share
                .evaluate(Decimal::from(effective_date.year()))
                .map_err(ParameterError::PensionShare)?;
            check_share("pension_share", share)?;
        }

        Ok(Self {
            effective_date,
            base_tariff,
            pension_share,
            allowances,
            health,
            first_bracket_threshold,
            first_bracket_rate,
        })
    }

    pub fn effective_date(&self) -> NaiveDate {
        self.effective_date
    }

    pub fn year(&self) -> i32 {
        self.effective_date.year()
    }

    pub fn base_tariff(&self) -> &TariffSpec {
        &self.base_tariff
    }

    /// Year-indexed share of pension contributions that may be deducted.
    pub fn pension_share(&self) -> &TariffSpec {
        &self.pension_share
    }

    pub fn allowances(&self) -> &Allowances {
        &self.allowances
    }

    pub fn health(&self) -> &HealthAllowanceRules {
        &self.health
    }

    /// Lower threshold of the first taxed bracket (the basic allowance).
    pub fn first_bracket_threshold(&self) -> Decimal {
        self.first_bracket_threshold
    }

    /// Entry marginal rate of the first taxed bracket.
    pub fn first_bracket_rate(&self) -> Decimal {
        self.first_bracket_rate
    }

    /// Whether the precare allowance is in force for this parameter year.
    pub fn precare_allowance_in_force(&self) -> bool {
        self.year() >= PRECARE_ALLOWANCE_FIRST_YEAR
    }
}

fn check_non_negative(
    name: &'static str,
    value: Decimal,
) -> Result<(), ParameterError> {
    if value < Decimal::ZERO {
        return Err(ParameterError::NegativeAmount { name, value });
    }
    Ok(())
}

fn check_share(
    name: &'static str,
    value: Decimal,
) -> Result<(), ParameterError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(ParameterError::ShareOutOfRange { name, value });
    }
    Ok(())
}
