//! Listed product prices.
//!
//! Catalog records carry prices either as plain numbers (`500`) or as display
//! strings with a currency symbol and grouping separators (`"₹1,999"`). Both
//! forms resolve to a [`Decimal`] unit amount for cart arithmetic.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when resolving a [`ListedPrice`] to an amount.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// No digits were left after stripping symbols and separators.
    #[error("price label {0:?} contains no digits")]
    NoDigits(String),
    /// The leading number does not fit a [`Decimal`].
    #[error("price label {0:?} is not a decimal number")]
    Malformed(String),
}

/// A price as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListedPrice {
    /// Numeric price in the store currency.
    Amount(Decimal),
    /// Display string such as `"₹1,999"` or `"$19.99"`.
    Label(String),
}

impl ListedPrice {
    /// Resolve the price to a unit amount.
    ///
    /// Numeric prices are returned as-is. Labels keep only ASCII digits and
    /// `.` before parsing, so `"₹1,999"` becomes `1999`. Only the leading
    /// number is read: `"1,999.00 (5.5% off)"` strips to `1999.005.5` and
    /// resolves to `1999.005`.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if a label has no digits or its number is out
    /// of range.
    pub fn unit_amount(&self) -> Result<Decimal, PriceError> {
        match self {
            Self::Amount(amount) => Ok(*amount),
            Self::Label(label) => parse_label(label),
        }
    }
}

impl fmt::Display for ListedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(amount) => write!(f, "{amount}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl From<Decimal> for ListedPrice {
    fn from(amount: Decimal) -> Self {
        Self::Amount(amount)
    }
}

impl From<&str> for ListedPrice {
    fn from(label: &str) -> Self {
        Self::Label(label.to_owned())
    }
}

fn parse_label(label: &str) -> Result<Decimal, PriceError> {
    let stripped: String = label
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if !stripped.chars().any(|c| c.is_ascii_digit()) {
        return Err(PriceError::NoDigits(label.to_owned()));
    }

    let number = leading_number(&stripped);
    let number = if number.starts_with('.') {
        format!("0{number}")
    } else {
        number.to_owned()
    };
    Decimal::from_str(&number).map_err(|_| PriceError::Malformed(label.to_owned()))
}

/// Longest prefix of `stripped` holding at most one `.`, without a
/// trailing `.`.
fn leading_number(stripped: &str) -> &str {
    let end = stripped
        .match_indices('.')
        .nth(1)
        .map_or(stripped.len(), |(i, _)| i);
    stripped.get(..end).unwrap_or(stripped).trim_end_matches('.')
}
