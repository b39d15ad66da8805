//! Parsing and formatting of the brokerage's currency display strings.
//!
//! The brokerage renders amounts as a single currency symbol followed by the
//! number, grouped with spaces and sometimes commas: `R9 323.46`, `$1,204.00`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Symbol used when there is no holding to take one from.
pub const DEFAULT_CURRENCY_SYMBOL: char = 'R';

/// Which grouping characters are removed before the number is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparatorPolicy {
    /// Only whitespace is removed; a `,` makes the value unparseable.
    SpacesOnly,
    /// Whitespace and `,` thousands separators are removed.
    #[default]
    SpacesAndCommas,
}

impl SeparatorPolicy {
    fn is_separator(self, c: char) -> bool {
        c.is_whitespace() || (self == SeparatorPolicy::SpacesAndCommas && c == ',')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurrencyError {
    #[error("Empty currency value")]
    Empty,
    #[error("Invalid currency value '{0}'")]
    Invalid(String),
    #[error("Amount out of range")]
    Overflow,
}

/// Parse a symbol-prefixed amount such as `R1 234.56` into a [`Decimal`].
///
/// The first character is always treated as the symbol and dropped.
pub fn parse_currency(value: &str, policy: SeparatorPolicy) -> Result<Decimal, CurrencyError> {
    let mut chars = value.trim().chars();
    if chars.next().is_none() {
        return Err(CurrencyError::Empty);
    }

    let number: String = chars.filter(|c| !policy.is_separator(*c)).collect();
    if number.is_empty() {
        return Err(CurrencyError::Invalid(value.to_string()));
    }

    Decimal::from_str(&number).map_err(|_| CurrencyError::Invalid(value.to_string()))
}

/// Leading symbol of a display amount, if any.
pub fn currency_symbol(value: &str) -> Option<char> {
    value.trim().chars().next()
}

/// Render an amount as `<symbol><amount to 2 dp>`, e.g. `R1234.50`.
pub fn format_currency(symbol: char, amount: Decimal) -> String {
    format!("{}{:.2}", symbol, amount.round_dp(2))
}
