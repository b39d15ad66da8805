use async_trait::async_trait;
use easyfolio_core::*;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::parse;

const SIGN_IN_PATH: &str = "/Account/SignIn";
const ACCOUNT_OVERVIEW_PATH: &str = "/AccountOverview";
const UPDATE_CURRENCY_PATH: &str = "/Menu/UpdateCurrency";
const VALUATIONS_PATH: &str = "/AccountOverview/GetTopSummary";
const HOLDINGS_PATH: &str = "/AccountOverview/GetHoldingsView";
const HOLDINGS_VIEW_CATEGORY: &str = "12";
const TRANSACTIONS_PATH: &str = "/AccountOverview/GetTransactionHistory";
const HISTORICAL_PRICES_PATH: &str = "/Equity/GetChartData";

/// Configuration for connecting to the EasyEquities platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerageConfig {
    /// Platform root, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BrokerageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://platform.easyequities.io".to_string(),
            timeout_secs: 30,
        }
    }
}

/// EasyEquities platform client.
///
/// The platform keeps the "current account" in the server-side session, so
/// every account-scoped read switches account first. `account_lock` holds
/// the switch and the read together so two requests for different accounts
/// cannot interleave.
pub struct EasyEquitiesClient {
    config: BrokerageConfig,
    http: reqwest::Client,
    account_lock: Mutex<()>,
}

impl EasyEquitiesClient {
    pub fn new(config: BrokerageConfig) -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("easyfolio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BrokerError::Upstream(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            config,
            http,
            account_lock: Mutex::new(()),
        })
    }

    /// Create a client and sign in with the given credentials.
    pub async fn connect(
        config: BrokerageConfig,
        username: &str,
        password: &str,
    ) -> Result<Self, BrokerError> {
        let client = Self::new(config)?;
        client.login(username, password).await?;
        Ok(client)
    }

    /// Sign in, storing the session cookies on this client.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), BrokerError> {
        let sign_in_page = self.get_text(SIGN_IN_PATH, &[]).await?;
        let token = parse::parse_verification_token(&sign_in_page)?;

        let form = [
            ("UserIdentifier", username),
            ("Password", password),
            ("ReturnUrl", ""),
            ("OneSignalGameId", ""),
            ("IsUsingNewLayoutSatrixOrEasyEquitiesMobileApp", "false"),
            ("__RequestVerificationToken", token.as_str()),
        ];

        let response = self
            .http
            .post(self.url(SIGN_IN_PATH))
            .form(&form)
            .send()
            .await
            .map_err(|e| BrokerError::Upstream(format!("Sign-in request failed: {}", e)))?;

        // A failed sign-in re-renders the sign-in page instead of redirecting.
        if !response.status().is_success() || response.url().path().starts_with(SIGN_IN_PATH) {
            return Err(BrokerError::Auth(
                "EasyEquities rejected the supplied credentials".to_string(),
            ));
        }

        info!(base_url = %self.config.base_url, "Signed in to EasyEquities");
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// GET `path` with `query` encoded by reqwest, mapping error statuses.
    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, BrokerError> {
        debug!(path, "GET");
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| BrokerError::Upstream(format!("GET {} failed: {}", path, e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BrokerError::Auth(format!(
                "Session rejected for {}",
                path
            ))),
            StatusCode::NOT_FOUND => Err(BrokerError::NotFound(path.to_string())),
            status if !status.is_success() => Err(BrokerError::Upstream(format!(
                "GET {} returned {}",
                path, status
            ))),
            _ => Ok(response),
        }
    }

    async fn get_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String, BrokerError> {
        self.get(path, query)
            .await?
            .text()
            .await
            .map_err(|e| BrokerError::Upstream(format!("Read error on {}: {}", path, e)))
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, BrokerError> {
        self.get(path, query)
            .await?
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("Invalid JSON from {}: {}", path, e)))
    }

    /// Make `account_id` the session's current account.
    ///
    /// Callers must hold `account_lock` until their follow-up read completes.
    async fn switch_account(&self, account_id: &str) -> Result<(), BrokerError> {
        self.get(UPDATE_CURRENCY_PATH, &[("trustAccountId", account_id)])
            .await?;
        debug!(account_id, "Switched active account");
        Ok(())
    }
}

#[async_trait]
impl BrokerageClient for EasyEquitiesClient {
    async fn accounts(&self) -> Result<Vec<Account>, BrokerError> {
        let html = self.get_text(ACCOUNT_OVERVIEW_PATH, &[]).await?;
        parse::parse_accounts(&html)
    }

    async fn valuations(&self, account_id: &str) -> Result<serde_json::Value, BrokerError> {
        let _guard = self.account_lock.lock().await;
        self.switch_account(account_id).await?;
        self.get_json(VALUATIONS_PATH, &[]).await
    }

    async fn holdings(&self, account_id: &str) -> Result<Vec<Holding>, BrokerError> {
        let html = {
            let _guard = self.account_lock.lock().await;
            self.switch_account(account_id).await?;
            self.get_text(HOLDINGS_PATH, &[("stockViewCategoryId", HOLDINGS_VIEW_CATEGORY)])
                .await?
        };
        parse::parse_holdings(&html)
    }

    async fn transactions(&self, account_id: &str) -> Result<serde_json::Value, BrokerError> {
        let _guard = self.account_lock.lock().await;
        self.switch_account(account_id).await?;
        self.get_json(TRANSACTIONS_PATH, &[]).await
    }

    async fn historical_prices(
        &self,
        contract_code: &str,
        period: Period,
    ) -> Result<serde_json::Value, BrokerError> {
        self.get_json(
            HISTORICAL_PRICES_PATH,
            &[
                ("contractCode", contract_code),
                ("period", period.upstream_value()),
            ],
        )
        .await
    }
}
