//! RPC error types and their HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use votechain_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("signature does not match the ballot")]
    BadSignature,

    #[error("recipient {0} is not a party")]
    UnknownRecipient(String),

    #[error("voter {0} received no grant")]
    UnknownVoter(String),

    #[error("no spendable tokens left")]
    AlreadyVoted,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("metrics are not enabled")]
    MetricsDisabled,

    #[error("node error: {0}")]
    Node(String),

    #[error("server error: {0}")]
    Server(String),
}

/// JSON body of every error response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl RpcError {
    /// Stable machine-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            RpcError::BadSignature => "bad-signature",
            RpcError::UnknownRecipient(_) => "unknown-recipient",
            RpcError::UnknownVoter(_) => "unknown-voter",
            RpcError::AlreadyVoted => "already-voted",
            RpcError::InvalidRequest(_) => "invalid-data",
            RpcError::MetricsDisabled => "not-found",
            RpcError::Node(_) | RpcError::Server(_) => "unknown-error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::BadSignature => StatusCode::UNAUTHORIZED,
            RpcError::UnknownVoter(_) => StatusCode::FORBIDDEN,
            RpcError::UnknownRecipient(_) => StatusCode::NOT_FOUND,
            RpcError::AlreadyVoted => StatusCode::CONFLICT,
            RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::MetricsDisabled => StatusCode::NOT_FOUND,
            RpcError::Node(_) | RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LedgerError> for RpcError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidSignature => RpcError::BadSignature,
            LedgerError::InsufficientBalance { .. } => RpcError::AlreadyVoted,
            LedgerError::InvalidTransaction(reason) => RpcError::InvalidRequest(reason),
            other => RpcError::Node(other.to_string()),
        }
    }
}

impl From<votechain_store::StoreError> for RpcError {
    fn from(e: votechain_store::StoreError) -> Self {
        RpcError::Node(e.to_string())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.name().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
