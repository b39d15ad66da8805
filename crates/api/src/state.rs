use easyfolio_core::{BrokerageClient, SeparatorPolicy};
use std::sync::Arc;

/// Request-handling options fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// How currency strings are cleaned before parsing in the
    /// dashboard and profit/loss views.
    pub separator_policy: SeparatorPolicy,
}

/// Shared application state accessible by all route handlers.
pub struct AppState {
    /// Signed-in brokerage session, created once at startup.
    pub client: Arc<dyn BrokerageClient>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(client: Arc<dyn BrokerageClient>, config: AppConfig) -> Self {
        Self { client, config }
    }
}
