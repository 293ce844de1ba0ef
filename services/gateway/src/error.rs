// HTTP error mapping for ledger failures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use ledger_core::Error as LedgerError;

pub enum GatewayError {
    /// Path id that is not an integer
    UnknownPath(String),
    /// Body that is not valid JSON for the endpoint
    MalformedBody(String),
    Ledger(LedgerError),
    InternalError(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UnknownPath(_) => StatusCode::NOT_FOUND,
            GatewayError::MalformedBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Ledger(e) => match e {
                LedgerError::UnknownAccount(_) => StatusCode::NOT_FOUND,
                LedgerError::InvalidAmount(_)
                | LedgerError::InvalidKind(_)
                | LedgerError::InvalidDescription(_)
                | LedgerError::LimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                LedgerError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                LedgerError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            GatewayError::UnknownPath(id) => format!("Account not found: {}", id),
            GatewayError::MalformedBody(msg) => format!("Malformed body: {}", msg),
            GatewayError::Ledger(e) => e.to_string(),
            GatewayError::InternalError(msg) => format!("Internal error: {}", msg),
        };

        (status, Json(serde_json::json!({
            "error": message,
            "timestamp": Utc::now(),
        }))).into_response()
    }
}

impl From<LedgerError> for GatewayError {
    fn from(err: LedgerError) -> Self {
        GatewayError::Ledger(err)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::MalformedBody(err.to_string())
    }
}
