//! Calculation modules for withholding tax and benefit precedence.
//!
//! The withholding chain runs tax class assignment, precare allowance and
//! the tariff lookup per person. Benefit precedence is resolved per
//! household. [`pipeline`] drives both over a whole population.

pub mod benefit_priority;
pub mod common;
pub mod pipeline;
pub mod precare;
pub mod tariff;
pub mod tax_class;
pub mod withholding;

pub use benefit_priority::{BenefitPriorityResolver, PrecedenceFlags};
pub use pipeline::{HouseholdResult, PersonResult, Pipeline, PipelineError, PipelineOutput};
pub use precare::{PrecareAllowance, PrecareAllowanceCalculator, PrecareRegime};
pub use tariff::{TariffBracket, TariffError, TariffSpec};
pub use tax_class::{ClassConditions, TaxClassAssigner, TaxClassError};
pub use withholding::{WithholdingError, WithholdingTaxCalculator, WithholdingTaxResult};
