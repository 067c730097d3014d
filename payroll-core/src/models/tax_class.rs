use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A numeric code that does not name an assignable withholding class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tax class {0} is outside 1..=5")]
pub struct InvalidTaxClass(pub u8);

/// Statutory withholding class (Lohnsteuerklasse).
///
/// `Six` (secondary employment) is reserved: the assigner never produces it
/// and [`TaxClass::try_from`] rejects code 6. Callers that genuinely model a
/// second job must construct it explicitly.
///
/// Serialized as its numeric code; deserialization goes through
/// [`TryFrom<u8>`] and so accepts the same codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaxClass {
    /// Single, not a single parent.
    One,
    /// Single parent.
    Two,
    /// Higher earner of a single-earner couple.
    Three,
    /// Jointly assessed, both partners earn.
    Four,
    /// Lower earner of a single-earner couple.
    Five,
    /// Secondary employment.
    Six,
}

impl TaxClass {
    pub const ASSIGNABLE: [TaxClass; 5] = [
        TaxClass::One,
        TaxClass::Two,
        TaxClass::Three,
        TaxClass::Four,
        TaxClass::Five,
    ];

    pub fn code(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
        }
    }

    /// Classes whose work-expense and special-expense allowances are already
    /// consumed by another employment.
    pub fn is_secondary_employment(&self) -> bool {
        matches!(self, Self::Six)
    }
}

impl TryFrom<u8> for TaxClass {
    type Error = InvalidTaxClass;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            5 => Ok(Self::Five),
            other => Err(InvalidTaxClass(other)),
        }
    }
}

impl From<TaxClass> for u8 {
    fn from(class: TaxClass) -> Self {
        class.code()
    }
}

impl fmt::Display for TaxClass {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
