// =============================================================================
// Error taxonomy
// =============================================================================
//
// Named by kind, not by type, matching the contract callers and the journal
// depend on: every venue call and every ingress decision ends in exactly one
// of these. `EngineError` is the boundary type; internal plumbing still uses
// `anyhow::Result` where the caller only needs a human-readable failure.
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    #[error("strategy '{0}' is disabled")]
    StrategyDisabled(String),

    #[error("symbol '{0}' is busy")]
    SymbolBusy(String),

    #[error("connectivity error: {0}")]
    Connectivity(String),

    #[error("venue rejected order: {code} {message}")]
    VenueRejected { code: String, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidSignal(_) => "InvalidSignal",
            EngineError::StrategyDisabled(_) => "StrategyDisabled",
            EngineError::SymbolBusy(_) => "SymbolBusy",
            EngineError::Connectivity(_) => "ConnectivityError",
            EngineError::VenueRejected { .. } => "VenueRejected",
            EngineError::Configuration(_) => "ConfigurationError",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::InvalidSignal(_) => StatusCode::BAD_REQUEST,
            EngineError::StrategyDisabled(_) => StatusCode::OK,
            EngineError::SymbolBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Connectivity(_) | EngineError::VenueRejected { .. } => {
                StatusCode::BAD_GATEWAY
            }
            EngineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody {
            kind: self.kind(),
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
