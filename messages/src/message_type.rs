use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MessageError;

/// Every message tag of the push protocol.
///
/// Tags travel as kebab-case strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    // Queries
    GetHeight,
    GetMissingBlocks,
    GetBlock,
    Register,

    // Consensus
    ForgeBlock,
    BlockForged,
    TransactionReceived,

    // Replies
    Error,
    Response,
    NoAction,
    Disconnect,

    CloseConnection,
}

impl MessageType {
    pub const ALL: [MessageType; 12] = [
        MessageType::GetHeight,
        MessageType::GetMissingBlocks,
        MessageType::GetBlock,
        MessageType::Register,
        MessageType::ForgeBlock,
        MessageType::BlockForged,
        MessageType::TransactionReceived,
        MessageType::Error,
        MessageType::Response,
        MessageType::NoAction,
        MessageType::Disconnect,
        MessageType::CloseConnection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::GetHeight => "get-height",
            MessageType::GetMissingBlocks => "get-missing-blocks",
            MessageType::GetBlock => "get-block",
            MessageType::Register => "register",
            MessageType::ForgeBlock => "forge-block",
            MessageType::BlockForged => "block-forged",
            MessageType::TransactionReceived => "transaction-received",
            MessageType::Error => "error",
            MessageType::Response => "response",
            MessageType::NoAction => "no-action",
            MessageType::Disconnect => "disconnect",
            MessageType::CloseConnection => "close-connection",
        }
    }

    /// Replies are logged by the receiver, never routed to a handler.
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            MessageType::Error | MessageType::Response | MessageType::NoAction
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| MessageError::UnknownMessage(s.to_string()))
    }
}
