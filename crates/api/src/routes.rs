use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use easyfolio_core::analytics::{
    compute_profit_loss, dedup_by_contract_code, HoldingPerformance, TOP_PERFORMER_COUNT,
};
use easyfolio_core::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health
        .route("/health", get(health_check))
        // Accounts
        .route("/accounts", get(list_accounts))
        .route("/valuations/{account_id}", get(valuations))
        .route("/transactions/{account_id}", get(transactions))
        // Holdings
        .route("/holdings/{account_id}", get(holdings))
        .route("/all-holdings", get(all_holdings))
        // Analytics
        .route("/dashboard/{account_id}", get(dashboard))
        .route("/profit-loss/{account_id}", get(profit_loss))
        // Instruments
        .route(
            "/historical-prices/{contract_code}/{period}",
            get(historical_prices),
        )
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

const NOT_AVAILABLE: &str = "N/A";

async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AccountListing>>, ApiError> {
    let accounts = state.client.accounts().await?;

    let mut listings = Vec::with_capacity(accounts.len());
    for account in accounts {
        let summary = match account_summary(state.client.as_ref(), &account.id).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "Account summary unavailable");
                None
            }
        };
        listings.push(AccountListing { account, summary });
    }

    Ok(Json(listings))
}

async fn account_summary(
    client: &dyn BrokerageClient,
    account_id: &str,
) -> Result<AccountSummary, BrokerError> {
    let valuations = client.valuations(account_id).await?;
    let holdings = client.holdings(account_id).await?;

    let top_summary = valuations.get("TopSummary");
    let field = |key: &str| {
        top_summary
            .and_then(|summary| summary.get(key))
            .filter(|value| !value.is_null())
            .map(|value| match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };

    Ok(AccountSummary {
        total_value: field("TotalValue"),
        available_cash: field("AvailableCash"),
        holdings_count: holdings.len(),
    })
}

async fn valuations(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.client.valuations(&account_id).await?))
}

async fn transactions(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.client.transactions(&account_id).await?))
}

// ---------------------------------------------------------------------------
// Holdings
// ---------------------------------------------------------------------------

async fn holdings(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<Vec<Holding>>, ApiError> {
    Ok(Json(state.client.holdings(&account_id).await?))
}

async fn all_holdings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AccountHolding>>, ApiError> {
    let accounts = state.client.accounts().await?;

    let mut tagged = Vec::new();
    for account in &accounts {
        match state.client.holdings(&account.id).await {
            Ok(holdings) => tagged.extend(holdings.into_iter().map(|h| AccountHolding {
                name: h.name,
                contract_code: h.contract_code.unwrap_or_default(),
                account_name: account.name.clone(),
                account_id: account.id.clone(),
            })),
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "Skipping account holdings");
            }
        }
    }

    Ok(Json(dedup_by_contract_code(tagged)))
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct DashboardHolding {
    name: String,
    purchase_value: String,
    current_value: String,
    #[serde(with = "rust_decimal::serde::float")]
    profit_loss: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    profit_loss_percentage: Decimal,
}

impl From<HoldingPerformance> for DashboardHolding {
    fn from(h: HoldingPerformance) -> Self {
        Self {
            name: h.name,
            purchase_value: h.purchase_display,
            current_value: h.current_display,
            profit_loss: h.profit_loss,
            profit_loss_percentage: h.profit_loss_percentage,
        }
    }
}

#[derive(Debug, Serialize)]
struct Dashboard {
    total_value: String,
    total_profit_loss_value: String,
    #[serde(with = "rust_decimal::serde::float")]
    total_profit_loss_percentage: Decimal,
    holdings: Vec<DashboardHolding>,
    top_performers: Vec<DashboardHolding>,
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<Dashboard>, ApiError> {
    let holdings = state.client.holdings(&account_id).await?;
    let perf = compute_profit_loss(&holdings, state.config.separator_policy)?;

    let top_performers = perf
        .top_performers(TOP_PERFORMER_COUNT)
        .into_iter()
        .map(DashboardHolding::from)
        .collect();

    Ok(Json(Dashboard {
        total_value: format_currency(perf.currency, perf.total_current_value),
        total_profit_loss_value: format_currency(perf.currency, perf.total_profit_loss),
        total_profit_loss_percentage: perf.total_profit_loss_percentage,
        holdings: perf.holdings.into_iter().map(DashboardHolding::from).collect(),
        top_performers,
    }))
}

#[derive(Debug, Serialize)]
struct ProfitLossHolding {
    name: String,
    #[serde(with = "rust_decimal::serde::float")]
    purchase_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    current_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    profit_loss: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    profit_loss_percentage: Decimal,
}

#[derive(Debug, Serialize)]
struct ProfitLossReport {
    holdings: Vec<ProfitLossHolding>,
    #[serde(with = "rust_decimal::serde::float")]
    total_investment: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    total_current_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    total_profit_loss: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    total_profit_loss_percentage: Decimal,
    currency: String,
}

async fn profit_loss(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<ProfitLossReport>, ApiError> {
    let holdings = state.client.holdings(&account_id).await?;
    let perf = compute_profit_loss(&holdings, state.config.separator_policy)?;

    Ok(Json(ProfitLossReport {
        holdings: perf
            .holdings
            .into_iter()
            .map(|h| ProfitLossHolding {
                name: h.name,
                purchase_value: h.purchase_value,
                current_value: h.current_value,
                profit_loss: h.profit_loss,
                profit_loss_percentage: h.profit_loss_percentage,
            })
            .collect(),
        total_investment: perf.total_purchase_value,
        total_current_value: perf.total_current_value,
        total_profit_loss: perf.total_profit_loss,
        total_profit_loss_percentage: perf.total_profit_loss_percentage,
        currency: perf.currency.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Instruments
// ---------------------------------------------------------------------------

async fn historical_prices(
    State(state): State<Arc<AppState>>,
    Path((contract_code, period)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let period: Period = period.parse()?;
    Ok(Json(
        state.client.historical_prices(&contract_code, period).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::{HashMap, HashSet};
    use tower::ServiceExt;

    /// In-memory brokerage with per-account failure injection.
    #[derive(Default)]
    struct MockBrokerage {
        accounts: Vec<Account>,
        holdings: HashMap<String, Vec<Holding>>,
        /// Accounts whose valuations lookup fails.
        failing_valuations: HashSet<String>,
        /// Accounts whose holdings lookup fails.
        failing_holdings: HashSet<String>,
        accounts_down: bool,
    }

    impl MockBrokerage {
        fn with_account(mut self, id: &str, name: &str, holdings: Vec<Holding>) -> Self {
            self.accounts.push(Account {
                id: id.to_string(),
                name: name.to_string(),
                trading_currency_id: "2".to_string(),
            });
            self.holdings.insert(id.to_string(), holdings);
            self
        }
    }

    #[async_trait]
    impl BrokerageClient for MockBrokerage {
        async fn accounts(&self) -> Result<Vec<Account>, BrokerError> {
            if self.accounts_down {
                return Err(BrokerError::Upstream("connection refused".to_string()));
            }
            Ok(self.accounts.clone())
        }

        async fn valuations(&self, account_id: &str) -> Result<serde_json::Value, BrokerError> {
            if self.failing_valuations.contains(account_id) {
                return Err(BrokerError::Upstream("valuation timeout".to_string()));
            }
            Ok(serde_json::json!({
                "TopSummary": {
                    "TotalValue": format!("R{}000.00", account_id),
                    "AvailableCash": "R12.50",
                }
            }))
        }

        async fn holdings(&self, account_id: &str) -> Result<Vec<Holding>, BrokerError> {
            if self.failing_holdings.contains(account_id) {
                return Err(BrokerError::Upstream("holdings timeout".to_string()));
            }
            self.holdings
                .get(account_id)
                .cloned()
                .ok_or_else(|| BrokerError::NotFound(account_id.to_string()))
        }

        async fn transactions(&self, account_id: &str) -> Result<serde_json::Value, BrokerError> {
            Ok(serde_json::json!([
                { "TransactionId": 1, "AccountId": account_id, "Comment": "Deposit" }
            ]))
        }

        async fn historical_prices(
            &self,
            contract_code: &str,
            period: Period,
        ) -> Result<serde_json::Value, BrokerError> {
            Ok(serde_json::json!({
                "contract_code": contract_code,
                "period": period.upstream_value(),
                "prices": [10.5, 11.0],
            }))
        }
    }

    fn app(mock: MockBrokerage) -> Router {
        app_with_config(mock, AppConfig::default())
    }

    fn app_with_config(mock: MockBrokerage, config: AppConfig) -> Router {
        crate::build_router(AppState::new(Arc::new(mock), config))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn sample_holdings() -> Vec<Holding> {
        vec![
            Holding::new("Satrix 40", "R1 000.00", "R1 250.00").with_contract_code("EQU.ZA.STX40"),
            Holding::new("Naspers", "R2 000.00", "R1 500.00").with_contract_code("EQU.ZA.NPN"),
        ]
    }

    #[tokio::test]
    async fn test_health_check() {
        let (status, body) = get_json(app(MockBrokerage::default()), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_accounts_tolerate_summary_failure() {
        let mut mock = MockBrokerage::default()
            .with_account("1", "ZAR", sample_holdings())
            .with_account("2", "USD", vec![])
            .with_account("3", "TFSA", sample_holdings());
        mock.failing_valuations.insert("2".to_string());

        let (status, body) = get_json(app(mock), "/api/accounts").await;
        assert_eq!(status, StatusCode::OK);

        let accounts = body.as_array().unwrap();
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[0]["id"], "1");
        assert_eq!(accounts[0]["summary"]["total_value"], "R1000.00");
        assert_eq!(accounts[0]["summary"]["available_cash"], "R12.50");
        assert_eq!(accounts[0]["summary"]["holdings_count"], 2);
        assert!(accounts[1].get("summary").is_none());
        assert_eq!(accounts[1]["name"], "USD");
        assert!(accounts[2].get("summary").is_some());
    }

    #[tokio::test]
    async fn test_accounts_upstream_failure_is_error_envelope() {
        let mock = MockBrokerage {
            accounts_down: true,
            ..Default::default()
        };
        let (status, body) = get_json(app(mock), "/api/accounts").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Upstream request failed: connection refused");
    }

    #[tokio::test]
    async fn test_dashboard_totals_and_top_performers() {
        let mut holdings = sample_holdings();
        holdings.extend([
            Holding::new("A", "R100", "R110"),
            Holding::new("B", "R100", "R300"),
            Holding::new("C", "R0.00", "R5.00"),
            Holding::new("D", "R100", "R101"),
        ]);
        let mock = MockBrokerage::default().with_account("1", "ZAR", holdings);

        let (status, body) = get_json(app(mock), "/api/dashboard/1").await;
        assert_eq!(status, StatusCode::OK);

        // Purchase 3300, current 3266.
        assert_eq!(body["total_value"], "R3266.00");
        assert_eq!(body["total_profit_loss_value"], "R-34.00");
        let pct = body["total_profit_loss_percentage"].as_f64().unwrap();
        assert!((pct - (-34.0 / 3300.0 * 100.0)).abs() < 1e-9);

        let holdings = body["holdings"].as_array().unwrap();
        assert_eq!(holdings.len(), 6);
        assert_eq!(holdings[0]["purchase_value"], "R1 000.00");
        assert_eq!(holdings[0]["profit_loss"].as_f64(), Some(250.0));
        assert_eq!(holdings[4]["profit_loss_percentage"].as_f64(), Some(0.0));

        let top: Vec<&str> = body["top_performers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["name"].as_str().unwrap())
            .collect();
        assert_eq!(top, vec!["B", "Satrix 40", "A", "D", "C"]);
    }

    #[tokio::test]
    async fn test_dashboard_without_holdings_uses_default_symbol() {
        let mock = MockBrokerage::default().with_account("1", "ZAR", vec![]);
        let (status, body) = get_json(app(mock), "/api/dashboard/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_value"], "R0.00");
        assert_eq!(body["total_profit_loss_value"], "R0.00");
        assert_eq!(body["total_profit_loss_percentage"].as_f64(), Some(0.0));
        assert!(body["top_performers"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profit_loss_numeric_breakdown() {
        let holdings = vec![
            Holding::new("S&P 500", "$1,000.00", "$1,100.00"),
            Holding::new("Nasdaq", "$500.00", "$450.00"),
        ];
        let mock = MockBrokerage::default().with_account("9", "USD", holdings);

        let (status, body) = get_json(app(mock), "/api/profit-loss/9").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currency"], "$");
        assert_eq!(body["total_investment"].as_f64(), Some(1500.0));
        assert_eq!(body["total_current_value"].as_f64(), Some(1550.0));
        assert_eq!(body["total_profit_loss"].as_f64(), Some(50.0));
        assert_eq!(body["holdings"][0]["purchase_value"].as_f64(), Some(1000.0));
        assert_eq!(body["holdings"][1]["profit_loss_percentage"].as_f64(), Some(-10.0));
    }

    #[tokio::test]
    async fn test_spaces_only_policy_rejects_comma_values() {
        let holdings = vec![Holding::new("S&P 500", "$1,000.00", "$1,100.00")];
        let mock = MockBrokerage::default().with_account("9", "USD", holdings);
        let config = AppConfig {
            separator_policy: SeparatorPolicy::SpacesOnly,
        };

        let (status, body) = get_json(app_with_config(mock, config), "/api/dashboard/9").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Invalid currency value '$1,000.00'");
    }

    #[tokio::test]
    async fn test_out_of_range_amounts_return_error_envelope() {
        let holdings = vec![
            Holding::new("Big", "R50000000000000000000000000000", "R1"),
            Holding::new("Big", "R50000000000000000000000000000", "R1"),
        ];
        let mock = MockBrokerage::default().with_account("1", "ZAR", holdings);
        let app = app(mock);

        for uri in ["/api/dashboard/1", "/api/profit-loss/1"] {
            let (status, body) = get_json(app.clone(), uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["error"], "Amount out of range");
        }
    }

    #[tokio::test]
    async fn test_holdings_and_transactions_pass_through() {
        let mock = MockBrokerage::default().with_account("1", "ZAR", sample_holdings());
        let app = app(mock);

        let (status, body) = get_json(app.clone(), "/api/holdings/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "Satrix 40");
        assert_eq!(body[0]["contract_code"], "EQU.ZA.STX40");
        assert_eq!(body[1]["current_value"], "R1 500.00");

        let (status, body) = get_json(app.clone(), "/api/transactions/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["Comment"], "Deposit");

        let (status, body) = get_json(app, "/api/valuations/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["TopSummary"]["AvailableCash"], "R12.50");
    }

    #[tokio::test]
    async fn test_all_holdings_dedups_and_skips_failed_accounts() {
        let mut mock = MockBrokerage::default()
            .with_account(
                "1",
                "ZAR",
                vec![
                    Holding::new("Apple", "R1", "R1").with_contract_code("A"),
                    Holding::new("Berkshire", "R1", "R1").with_contract_code("B"),
                    Holding::new("Cash", "R1", "R1"),
                ],
            )
            .with_account(
                "2",
                "USD",
                vec![
                    Holding::new("Apple", "$1", "$1").with_contract_code("A"),
                    Holding::new("Cash", "$1", "$1").with_contract_code(""),
                ],
            )
            .with_account("3", "TFSA", sample_holdings());
        mock.failing_holdings.insert("3".to_string());

        let (status, body) = get_json(app(mock), "/api/all-holdings").await;
        assert_eq!(status, StatusCode::OK);

        let holdings = body.as_array().unwrap();
        assert_eq!(holdings.len(), 4);
        assert_eq!(holdings[0]["contract_code"], "A");
        assert_eq!(holdings[0]["account_id"], "1");
        assert_eq!(holdings[1]["contract_code"], "B");
        assert_eq!(holdings[2]["contract_code"], "");
        assert_eq!(holdings[2]["account_name"], "ZAR");
        assert_eq!(holdings[3]["contract_code"], "");
        assert_eq!(holdings[3]["account_name"], "USD");
    }

    #[tokio::test]
    async fn test_historical_prices_accepts_case_insensitive_period() {
        let (status, body) = get_json(
            app(MockBrokerage::default()),
            "/api/historical-prices/EQU.ZA.SYGJP/month",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contract_code"], "EQU.ZA.SYGJP");
        assert_eq!(body["period"], "OneMonth");
    }

    #[tokio::test]
    async fn test_historical_prices_rejects_unknown_period() {
        let (status, body) = get_json(
            app(MockBrokerage::default()),
            "/api/historical-prices/EQU.ZA.SYGJP/fortnight",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let msg = body["error"].as_str().unwrap();
        assert!(msg.starts_with("Invalid period. Choose from:"));
        assert!(msg.contains("ONE_MONTH"));
        assert!(msg.contains("MAX"));
    }
}
