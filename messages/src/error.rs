use thiserror::Error;
use votechain_crypto::CryptoError;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("unknown message type {0:?}")]
    UnknownMessage(String),

    #[error("signature does not match sender")]
    BadSignature,
}
