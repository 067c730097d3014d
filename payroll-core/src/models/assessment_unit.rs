use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::AssessmentUnitId;

/// Aggregate view of the persons jointly assessed for income tax.
///
/// Only the wage extremes are kept; they are all the class assignment needs.
/// A unit always has at least one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentUnit {
    pub assessment_unit_id: AssessmentUnitId,
    pub member_count: usize,
    pub max_wage_m: Decimal,
    pub min_wage_m: Decimal,
}

impl AssessmentUnit {
    /// Starts an aggregate from its first member's monthly wage.
    pub fn with_first_member(
        assessment_unit_id: AssessmentUnitId,
        wage_m: Decimal,
    ) -> Self {
        Self {
            assessment_unit_id,
            member_count: 1,
            max_wage_m: wage_m,
            min_wage_m: wage_m,
        }
    }

    /// Folds one more member's wage into the aggregate.
    pub fn include(
        &mut self,
        wage_m: Decimal,
    ) {
        self.member_count += 1;
        self.max_wage_m = self.max_wage_m.max(wage_m);
        self.min_wage_m = self.min_wage_m.min(wage_m);
    }
}
