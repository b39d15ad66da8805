use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use easyfolio_core::{BrokerError, CurrencyError, InvalidPeriod};

/// Errors returned by route handlers, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request itself is malformed.
    #[error("{0}")]
    Validation(String),
    /// The brokerage session was rejected.
    #[error("{0}")]
    Auth(String),
    /// The brokerage could not be reached or answered unexpectedly.
    #[error("{0}")]
    Upstream(String),
    /// Upstream data could not be turned into a response.
    #[error("{0}")]
    Processing(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) | ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Auth(_) => ApiError::Auth(err.to_string()),
            BrokerError::Upstream(_) | BrokerError::Parse(_) | BrokerError::NotFound(_) => {
                ApiError::Upstream(err.to_string())
            }
        }
    }
}

impl From<CurrencyError> for ApiError {
    fn from(err: CurrencyError) -> Self {
        ApiError::Processing(err.to_string())
    }
}

impl From<InvalidPeriod> for ApiError {
    fn from(err: InvalidPeriod) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Rejected request");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(BrokerError::Auth("bad password".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(BrokerError::Upstream("timeout".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(CurrencyError::Empty).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(InvalidPeriod("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_message_keeps_cause() {
        let err = ApiError::from(BrokerError::Upstream("connection reset".into()));
        assert_eq!(err.to_string(), "Upstream request failed: connection reset");
    }
}
