//! Precedence of housing benefit and child supplement over the core benefit.
//!
//! A household first covers its subsistence floor from core-benefit income,
//! advance child support and child benefit. Whatever remains is the
//! *residual need*. Housing benefit and child supplement take precedence
//! when they, alone or combined, cover that residual need.
//!
//! The three flags are independent and may all hold at once; choosing the
//! program that is actually paid out happens downstream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::floor_at_zero;
use crate::models::Household;

/// Precedence signals for one household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecedenceFlags {
    /// Need left after core-benefit income, advance child support and child
    /// benefit; never negative.
    pub residual_need: Decimal,
    /// Housing benefit alone covers the residual need.
    pub housing: bool,
    /// Child supplement alone covers the residual need.
    pub child_supplement: bool,
    /// Housing benefit and child supplement together cover the residual need.
    pub combined: bool,
}

/// Stateless resolver of benefit precedence.
#[derive(Debug, Clone, Copy, Default)]
pub struct BenefitPriorityResolver;

impl BenefitPriorityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Subsistence floor not covered by income and prior benefits.
    pub fn residual_need(
        &self,
        household: &Household,
    ) -> Decimal {
        floor_at_zero(
            household.subsistence_floor
                - household.core_benefit_income
                - household.advance_child_support
                - household.child_benefit,
        )
    }

    pub fn resolve(
        &self,
        household: &Household,
    ) -> PrecedenceFlags {
        let residual_need = self.residual_need(household);

        PrecedenceFlags {
            residual_need,
            housing: household.housing_benefit >= residual_need,
            child_supplement: household.child_supplement >= residual_need,
            combined: household.housing_benefit + household.child_supplement >= residual_need,
        }
    }
}
