use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::HouseholdId;

/// Household-level inputs of the benefit precedence check.
///
/// Every amount is monthly and already final under its own program's means
/// test; this crate only compares them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub household_id: HouseholdId,
    pub subsistence_floor: Decimal,
    pub core_benefit_income: Decimal,
    pub child_benefit: Decimal,
    pub advance_child_support: Decimal,
    pub housing_benefit: Decimal,
    pub child_supplement: Decimal,
}
