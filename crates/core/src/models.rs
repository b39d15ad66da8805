use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// A trust account held at the brokerage (e.g. "EasyEquities ZAR", "TFSA").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub trading_currency_id: String,
}

/// Headline figures shown next to an account in the accounts listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Display string as reported by the brokerage (e.g. "R12 345.67"), or "N/A".
    pub total_value: String,
    pub available_cash: String,
    pub holdings_count: usize,
}

/// An account as returned by the accounts listing.
///
/// `summary` is absent when the valuation lookup for this account failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountListing {
    #[serde(flatten)]
    pub account: Account,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<AccountSummary>,
}

// ---------------------------------------------------------------------------
// Holdings
// ---------------------------------------------------------------------------

/// A single instrument position within an account.
///
/// Monetary fields are kept exactly as the brokerage formats them
/// (currency symbol prefix, space thousands separators).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_code: Option<String>,
    pub purchase_value: String,
    pub current_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<String>,
}

impl Holding {
    /// Minimal holding with only the fields the analytics need.
    pub fn new(
        name: impl Into<String>,
        purchase_value: impl Into<String>,
        current_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            contract_code: None,
            purchase_value: purchase_value.into(),
            current_value: current_value.into(),
            current_price: None,
            img: None,
            view_url: None,
            isin: None,
            shares: None,
        }
    }

    pub fn with_contract_code(mut self, code: impl Into<String>) -> Self {
        self.contract_code = Some(code.into());
        self
    }
}

/// A holding tagged with the account it was found in (cross-account view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHolding {
    pub name: String,
    /// Empty when the brokerage did not report a contract code.
    pub contract_code: String,
    pub account_name: String,
    pub account_id: String,
}

// ---------------------------------------------------------------------------
// Historical price periods
// ---------------------------------------------------------------------------

/// Time range selector for historical price queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Period {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    Max,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
        Period::Max,
    ];

    /// Canonical name accepted on the API and CLI.
    pub fn name(&self) -> &'static str {
        match self {
            Period::OneMonth => "ONE_MONTH",
            Period::ThreeMonths => "THREE_MONTHS",
            Period::SixMonths => "SIX_MONTHS",
            Period::OneYear => "ONE_YEAR",
            Period::Max => "MAX",
        }
    }

    /// Value the brokerage's chart endpoint expects.
    pub fn upstream_value(&self) -> &'static str {
        match self {
            Period::OneMonth => "OneMonth",
            Period::ThreeMonths => "ThreeMonths",
            Period::SixMonths => "SixMonths",
            Period::OneYear => "OneYear",
            Period::Max => "Max",
        }
    }

    /// Comma separated list of every canonical name.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(Period::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a period name is not one of [`Period::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid period. Choose from: {}", Period::valid_names())]
pub struct InvalidPeriod(pub String);

impl FromStr for Period {
    type Err = InvalidPeriod;

    /// Case-insensitive. `MONTH` and `YEAR` are accepted as short forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "ONE_MONTH" | "MONTH" => Ok(Period::OneMonth),
            "THREE_MONTHS" => Ok(Period::ThreeMonths),
            "SIX_MONTHS" => Ok(Period::SixMonths),
            "ONE_YEAR" | "YEAR" => Ok(Period::OneYear),
            "MAX" => Ok(Period::Max),
            _ => Err(InvalidPeriod(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parse_is_case_insensitive() {
        assert_eq!("month".parse::<Period>(), Ok(Period::OneMonth));
        assert_eq!("One_Year".parse::<Period>(), Ok(Period::OneYear));
        assert_eq!("MAX".parse::<Period>(), Ok(Period::Max));
    }

    #[test]
    fn test_invalid_period_lists_names() {
        let err = "fortnight".parse::<Period>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid period. Choose from:"));
        for period in Period::ALL {
            assert!(msg.contains(period.name()));
        }
    }

    #[test]
    fn test_listing_omits_missing_summary() {
        let listing = AccountListing {
            account: Account {
                id: "123".to_string(),
                name: "EasyEquities ZAR".to_string(),
                trading_currency_id: "2".to_string(),
            },
            summary: None,
        };
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["id"], "123");
        assert!(json.get("summary").is_none());
    }
}
