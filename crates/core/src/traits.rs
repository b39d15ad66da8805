use crate::models::*;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Brokerage Client Trait
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the brokerage.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Upstream request failed: {0}")]
    Upstream(String),
    #[error("Unexpected upstream response: {0}")]
    Parse(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Read-only access to an authenticated brokerage session.
///
/// Implementations own the session (cookies, current account selection).
/// Methods that take an `account_id` select that account on the upstream
/// before reading, so callers never need to switch accounts themselves.
#[async_trait]
pub trait BrokerageClient: Send + Sync {
    /// All trust accounts visible to the logged-in user.
    async fn accounts(&self) -> Result<Vec<Account>, BrokerError>;

    /// Raw valuation payload for an account (contains `TopSummary`).
    async fn valuations(&self, account_id: &str) -> Result<serde_json::Value, BrokerError>;

    /// Holdings of an account with monetary values as display strings.
    async fn holdings(&self, account_id: &str) -> Result<Vec<Holding>, BrokerError>;

    /// Raw transaction history payload for an account.
    async fn transactions(&self, account_id: &str) -> Result<serde_json::Value, BrokerError>;

    /// Raw price series for an instrument over the given period.
    async fn historical_prices(
        &self,
        contract_code: &str,
        period: Period,
    ) -> Result<serde_json::Value, BrokerError>;
}
