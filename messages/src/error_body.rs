//! Typed bodies of `error` replies.

use std::fmt;

use serde::{Deserialize, Serialize};
use votechain_types::BlockHash;

use crate::MessageType;

pub const UNKNOWN_MESSAGE: &str = "message-unknown";
pub const UNKNOWN_ERROR: &str = "unknown-error";
pub const UNAUTHORIZED: &str = "unauthorized";
pub const BLOCK_NOT_FOUND: &str = "block-not-found";
pub const INVALID_DATA: &str = "invalid-data";
pub const STALE_BLOCK: &str = "stale-block";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub name: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn unknown_message(message: &str) -> Self {
        Self::new(UNKNOWN_MESSAGE, format!("unknown message {message}"))
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ERROR, "unknown error occurred")
    }

    pub fn unauthorized(reason: impl fmt::Display) -> Self {
        Self::new(UNAUTHORIZED, format!("unauthorized: {reason}"))
    }

    pub fn block_not_found(hash: &BlockHash) -> Self {
        Self::new(BLOCK_NOT_FOUND, format!("block {hash} not found"))
    }

    pub fn invalid_data(operation: MessageType) -> Self {
        Self::new(
            INVALID_DATA,
            format!("invalid values passed for {operation} operation"),
        )
    }

    pub fn stale_block(reason: impl Into<String>) -> Self {
        Self::new(STALE_BLOCK, reason)
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}
