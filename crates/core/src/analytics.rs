//! Portfolio arithmetic shared by the dashboard and profit/loss views.

use crate::currency::{
    currency_symbol, parse_currency, CurrencyError, SeparatorPolicy, DEFAULT_CURRENCY_SYMBOL,
};
use crate::models::{AccountHolding, Holding};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Number of holdings reported as top performers.
pub const TOP_PERFORMER_COUNT: usize = 5;

/// Profit/loss of a single holding.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingPerformance {
    pub name: String,
    /// Display strings as received from the brokerage.
    pub purchase_display: String,
    pub current_display: String,
    pub purchase_value: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percentage: Decimal,
}

/// Totals over every holding of an account.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioPerformance {
    pub currency: char,
    pub holdings: Vec<HoldingPerformance>,
    pub total_purchase_value: Decimal,
    pub total_current_value: Decimal,
    pub total_profit_loss: Decimal,
    pub total_profit_loss_percentage: Decimal,
}

impl PortfolioPerformance {
    /// The `n` best holdings by profit/loss percentage, best first.
    ///
    /// Holdings with equal percentages keep their original order.
    pub fn top_performers(&self, n: usize) -> Vec<HoldingPerformance> {
        let mut ranked = self.holdings.clone();
        ranked.sort_by(|a, b| b.profit_loss_percentage.cmp(&a.profit_loss_percentage));
        ranked.truncate(n);
        ranked
    }
}

/// `profit_loss / purchase_value * 100`, or zero when nothing was paid.
pub fn profit_loss_percentage(
    profit_loss: Decimal,
    purchase_value: Decimal,
) -> Result<Decimal, CurrencyError> {
    if purchase_value <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    profit_loss
        .checked_div(purchase_value)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or(CurrencyError::Overflow)
}

/// `current - purchase`, failing instead of panicking out of range.
pub fn checked_profit_loss(
    purchase_value: Decimal,
    current_value: Decimal,
) -> Result<Decimal, CurrencyError> {
    current_value
        .checked_sub(purchase_value)
        .ok_or(CurrencyError::Overflow)
}

fn checked_total(total: Decimal, value: Decimal) -> Result<Decimal, CurrencyError> {
    total.checked_add(value).ok_or(CurrencyError::Overflow)
}

/// Parse every holding's values and compute per-holding and total profit/loss.
///
/// Fails on the first holding whose values cannot be parsed under `policy`,
/// or when a total or percentage falls outside the `Decimal` range.
pub fn compute_profit_loss(
    holdings: &[Holding],
    policy: SeparatorPolicy,
) -> Result<PortfolioPerformance, CurrencyError> {
    let mut total_purchase_value = Decimal::ZERO;
    let mut total_current_value = Decimal::ZERO;
    let mut processed = Vec::with_capacity(holdings.len());

    for holding in holdings {
        let purchase_value = parse_currency(&holding.purchase_value, policy)?;
        let current_value = parse_currency(&holding.current_value, policy)?;
        let profit_loss = checked_profit_loss(purchase_value, current_value)?;

        total_purchase_value = checked_total(total_purchase_value, purchase_value)?;
        total_current_value = checked_total(total_current_value, current_value)?;

        processed.push(HoldingPerformance {
            name: holding.name.clone(),
            purchase_display: holding.purchase_value.clone(),
            current_display: holding.current_value.clone(),
            purchase_value,
            current_value,
            profit_loss,
            profit_loss_percentage: profit_loss_percentage(profit_loss, purchase_value)?,
        });
    }

    let total_profit_loss = checked_profit_loss(total_purchase_value, total_current_value)?;
    let currency = holdings
        .first()
        .and_then(|h| currency_symbol(&h.purchase_value))
        .unwrap_or(DEFAULT_CURRENCY_SYMBOL);

    Ok(PortfolioPerformance {
        currency,
        holdings: processed,
        total_purchase_value,
        total_current_value,
        total_profit_loss,
        total_profit_loss_percentage: profit_loss_percentage(
            total_profit_loss,
            total_purchase_value,
        )?,
    })
}

/// Keep the first holding per non-empty contract code.
///
/// Holdings without a contract code cannot be matched against each other
/// and are always kept.
pub fn dedup_by_contract_code(holdings: Vec<AccountHolding>) -> Vec<AccountHolding> {
    let mut seen = HashSet::new();
    holdings
        .into_iter()
        .filter(|h| h.contract_code.is_empty() || seen.insert(h.contract_code.clone()))
        .collect()
}
