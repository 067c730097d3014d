//! Progressive piecewise-polynomial tariffs.
//!
//! A [`TariffSpec`] is an ordered list of brackets. Each bracket starts at a
//! lower threshold and carries an intercept plus a rate vector; inside the
//! bracket the tariff value is
//!
//! ```text
//! intercept + rates[0]·d + rates[1]·d² + … ,   d = x − threshold
//! ```
//!
//! Brackets are lower-closed and upper-open, the last one is open-ended.
//! The same mechanism serves the income-tax tariff (degree 2) and the
//! year-indexed pension-share lookup (degree 1).
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use payroll_core::calculations::TariffSpec;
//!
//! let tariff = TariffSpec::from_continuity(
//!     vec![dec!(0), dec!(10000), dec!(50000)],
//!     vec![vec![dec!(0)], vec![dec!(0.20)], vec![dec!(0.40)]],
//!     dec!(0),
//! )
//! .unwrap();
//!
//! assert_eq!(tariff.evaluate(dec!(5000)).unwrap(), dec!(0));
//! assert_eq!(tariff.evaluate(dec!(60000)).unwrap(), dec!(12000));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or evaluating a tariff.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TariffError {
    /// A tariff needs at least one bracket.
    #[error("tariff has no brackets")]
    NoBrackets,

    /// Thresholds must be strictly increasing.
    #[error("bracket thresholds must be strictly increasing, got {current} after {previous}")]
    NonIncreasingThreshold { previous: Decimal, current: Decimal },

    /// Every bracket must carry the same number of rates.
    #[error("bracket {index} has {found} rates, expected {expected}")]
    RateDimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    /// Thresholds, rate vectors and intercepts must line up one-to-one.
    #[error("{thresholds} thresholds do not match {other} {what}")]
    BracketCountMismatch {
        thresholds: usize,
        other: usize,
        what: &'static str,
    },

    /// The tariff is undefined below its first threshold.
    #[error("value {value} lies below the first threshold {first}")]
    BelowFirstThreshold { value: Decimal, first: Decimal },

    /// The polynomial value does not fit into a `Decimal`.
    #[error("tariff value at {value} exceeds the decimal range")]
    Overflow { value: Decimal },
}

/// One bracket of a tariff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffBracket {
    /// Inclusive lower bound of the bracket.
    pub threshold: Decimal,

    /// Coefficients of `d, d², …` where `d` is the distance above `threshold`.
    pub rates: Vec<Decimal>,

    /// Tariff value at `threshold`.
    pub intercept: Decimal,
}

impl TariffBracket {
    /// Evaluates this bracket's polynomial at `x`, regardless of whether `x`
    /// falls inside the bracket.
    ///
    /// Powers of the distance are only raised up to the highest non-zero
    /// rate, so a linear top bracket stays finite far beyond the point where
    /// its unused square would overflow.
    fn polynomial_at(
        &self,
        x: Decimal,
    ) -> Result<Decimal, TariffError> {
        let overflow = || TariffError::Overflow { value: x };
        let used = self
            .rates
            .iter()
            .rposition(|rate| !rate.is_zero())
            .map_or(0, |last| last + 1);

        let distance = x.checked_sub(self.threshold).ok_or_else(overflow)?;
        let mut power = Decimal::ONE;
        let mut value = self.intercept;
        for rate in &self.rates[..used] {
            power = power.checked_mul(distance).ok_or_else(overflow)?;
            if rate.is_zero() {
                continue;
            }
            let term = rate.checked_mul(power).ok_or_else(overflow)?;
            value = value.checked_add(term).ok_or_else(overflow)?;
        }
        Ok(value)
    }
}

/// A validated, immutable piecewise-polynomial tariff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TariffSpec {
    brackets: Vec<TariffBracket>,
}

impl TariffSpec {
    /// Builds a tariff from brackets with explicit intercepts.
    ///
    /// # Errors
    ///
    /// Returns [`TariffError`] if the list is empty, thresholds are not
    /// strictly increasing, or the rate vectors differ in length.
    pub fn new(brackets: Vec<TariffBracket>) -> Result<Self, TariffError> {
        let first = brackets.first().ok_or(TariffError::NoBrackets)?;
        let degree = first.rates.len();

        for (index, pair) in brackets.windows(2).enumerate() {
            if pair[1].threshold <= pair[0].threshold {
                return Err(TariffError::NonIncreasingThreshold {
                    previous: pair[0].threshold,
                    current: pair[1].threshold,
                });
            }
            if pair[1].rates.len() != degree {
                return Err(TariffError::RateDimensionMismatch {
                    index: index + 1,
                    expected: degree,
                    found: pair[1].rates.len(),
                });
            }
        }

        Ok(Self { brackets })
    }

    /// Builds a tariff from thresholds, rates and per-bracket intercepts.
    pub fn from_parts(
        thresholds: Vec<Decimal>,
        rates: Vec<Vec<Decimal>>,
        intercepts: Vec<Decimal>,
    ) -> Result<Self, TariffError> {
        check_counts(&thresholds, &rates)?;
        if intercepts.len() != thresholds.len() {
            return Err(TariffError::BracketCountMismatch {
                thresholds: thresholds.len(),
                other: intercepts.len(),
                what: "intercepts",
            });
        }

        let brackets = thresholds
            .into_iter()
            .zip(rates)
            .zip(intercepts)
            .map(|((threshold, rates), intercept)| TariffBracket {
                threshold,
                rates,
                intercept,
            })
            .collect();

        Self::new(brackets)
    }

    /// Builds a continuous tariff: the first intercept is given, every later
    /// intercept is the previous bracket's polynomial evaluated at the new
    /// threshold.
    pub fn from_continuity(
        thresholds: Vec<Decimal>,
        rates: Vec<Vec<Decimal>>,
        first_intercept: Decimal,
    ) -> Result<Self, TariffError> {
        check_counts(&thresholds, &rates)?;

        let mut brackets: Vec<TariffBracket> = Vec::with_capacity(thresholds.len());
        for (threshold, rates) in thresholds.into_iter().zip(rates) {
            let intercept = match brackets.last() {
                Some(previous) => previous.polynomial_at(threshold)?,
                None => first_intercept,
            };
            brackets.push(TariffBracket {
                threshold,
                rates,
                intercept,
            });
        }

        Self::new(brackets)
    }

    pub fn brackets(&self) -> &[TariffBracket] {
        &self.brackets
    }

    /// Polynomial degree shared by all brackets.
    pub fn degree(&self) -> usize {
        self.brackets[0].rates.len()
    }

    pub fn first_threshold(&self) -> Decimal {
        self.brackets[0].threshold
    }

    /// Lower threshold of bracket `index`.
    pub fn threshold(
        &self,
        index: usize,
    ) -> Option<Decimal> {
        self.brackets.get(index).map(|b| b.threshold)
    }

    /// Linear (marginal at the threshold) rate of bracket `index`.
    pub fn linear_rate(
        &self,
        index: usize,
    ) -> Option<Decimal> {
        self.brackets
            .get(index)
            .and_then(|b| b.rates.first().copied())
    }

    /// Evaluates the tariff at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`TariffError::BelowFirstThreshold`] if `x` is smaller than
    /// the first threshold, or [`TariffError::Overflow`] if the value leaves
    /// the decimal range.
    pub fn evaluate(
        &self,
        x: Decimal,
    ) -> Result<Decimal, TariffError> {
        let index = self.bracket_index(x)?;
        self.brackets[index].polynomial_at(x)
    }

    /// Evaluates the tariff for many values at once.
    ///
    /// The values are visited in ascending order so the bracket cursor only
    /// moves forward; results come back in input order.
    pub fn evaluate_many(
        &self,
        values: &[Decimal],
    ) -> Result<Vec<Decimal>, TariffError> {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].cmp(&values[b]));

        let mut results = vec![Decimal::ZERO; values.len()];
        let mut cursor = 0;
        for position in order {
            let x = values[position];
            if x < self.first_threshold() {
                return Err(self.below_first(x));
            }
            while cursor + 1 < self.brackets.len() && self.brackets[cursor + 1].threshold <= x {
                cursor += 1;
            }
            results[position] = self.brackets[cursor].polynomial_at(x)?;
        }

        Ok(results)
    }

    fn bracket_index(
        &self,
        x: Decimal,
    ) -> Result<usize, TariffError> {
        // Number of brackets whose threshold is at or below x.
        match self.brackets.partition_point(|b| b.threshold <= x) {
            0 => Err(self.below_first(x)),
            count => Ok(count - 1),
        }
    }

    fn below_first(
        &self,
        value: Decimal,
    ) -> TariffError {
        TariffError::BelowFirstThreshold {
            value,
            first: self.first_threshold(),
        }
    }
}

fn check_counts(
    thresholds: &[Decimal],
    rates: &[Vec<Decimal>],
) -> Result<(), TariffError> {
    if thresholds.len() != rates.len() {
        return Err(TariffError::BracketCountMismatch {
            thresholds: thresholds.len(),
            other: rates.len(),
            what: "rate vectors",
        });
    }
    Ok(())
}
