//! HTML scraping for platform pages that have no JSON equivalent.

use easyfolio_core::{Account, BrokerError, Holding};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::form_urlencoded;

const TOKEN_INPUT: &str = r#"input[name="__RequestVerificationToken"]"#;
const ACCOUNT_ENTRY: &str = "#trust-account-types [data-id]";
const HOLDING_ROW: &str = ".holding-table-body .holding-inner-container";
const HOLDING_NAME: &str = ".equity-name";
const PURCHASE_VALUE: &str = ".purchase-value-cell";
const CURRENT_VALUE: &str = ".current-value-cell";
const CURRENT_PRICE: &str = ".current-price-cell";
const SHARES: &str = ".shares-cell";
const HOLDING_IMAGE: &str = "img.equity-image";
const VIEW_LINK: &str = "a.view-instrument";

fn selector(css: &str) -> Result<Selector, BrokerError> {
    Selector::parse(css).map_err(|e| BrokerError::Parse(format!("Bad selector {}: {}", css, e)))
}

/// Collapsed, trimmed text content of an element.
fn clean_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first descendant matching `sel`, if it has any.
fn child_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel)
        .next()
        .map(clean_text)
        .filter(|text| !text.is_empty())
}

/// Decoded `contractCode` query parameter of an instrument link.
fn contract_code_from_url(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let query = query.split_once('#').map_or(query, |(query, _)| query);
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key.eq_ignore_ascii_case("contractCode"))
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Anti-forgery token embedded in the sign-in form.
pub fn parse_verification_token(html: &str) -> Result<String, BrokerError> {
    let doc = Html::parse_document(html);
    let sel = selector(TOKEN_INPUT)?;
    doc.select(&sel)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
        .ok_or_else(|| BrokerError::Parse("Sign-in page has no verification token".to_string()))
}

/// Accounts from the account-overview page's account selector.
///
/// A page without an account selector yields no accounts.
pub fn parse_accounts(html: &str) -> Result<Vec<Account>, BrokerError> {
    let doc = Html::parse_document(html);
    let sel = selector(ACCOUNT_ENTRY)?;

    let accounts: Vec<Account> = doc
        .select(&sel)
        .filter_map(|entry| {
            let attrs = entry.value();
            Some(Account {
                id: attrs.attr("data-id")?.trim().to_string(),
                name: clean_text(entry),
                trading_currency_id: attrs
                    .attr("data-tradingcurrencyid")
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            })
        })
        .filter(|account| !account.id.is_empty())
        .collect();

    if accounts.is_empty() {
        warn!("No accounts found on account overview page");
    }
    Ok(accounts)
}

/// Holdings from the holdings view fragment.
///
/// Rows missing a name or either value are skipped.
pub fn parse_holdings(html: &str) -> Result<Vec<Holding>, BrokerError> {
    let doc = Html::parse_fragment(html);
    let row_sel = selector(HOLDING_ROW)?;
    let name_sel = selector(HOLDING_NAME)?;
    let purchase_sel = selector(PURCHASE_VALUE)?;
    let current_sel = selector(CURRENT_VALUE)?;
    let price_sel = selector(CURRENT_PRICE)?;
    let shares_sel = selector(SHARES)?;
    let img_sel = selector(HOLDING_IMAGE)?;
    let link_sel = selector(VIEW_LINK)?;

    let holdings = doc
        .select(&row_sel)
        .filter_map(|row| {
            let view_url = row
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string);
            let contract_code = row
                .value()
                .attr("data-contractcode")
                .map(str::to_string)
                .or_else(|| view_url.as_deref().and_then(contract_code_from_url));

            Some(Holding {
                name: child_text(row, &name_sel)?,
                contract_code,
                purchase_value: child_text(row, &purchase_sel)?,
                current_value: child_text(row, &current_sel)?,
                current_price: child_text(row, &price_sel),
                img: row
                    .select(&img_sel)
                    .next()
                    .and_then(|img| img.value().attr("src"))
                    .map(str::to_string),
                view_url,
                isin: row.value().attr("data-isin").map(str::to_string),
                shares: child_text(row, &shares_sel),
            })
        })
        .collect();

    Ok(holdings)
}
