use thiserror::Error;
use votechain_messages::{ErrorBody, MessageError, MessageType};

use crate::hub::ConnectionId;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message error: {0}")]
    Message(#[from] MessageError),

    #[error("frame too large: {size} > {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("no registered peers")]
    NoPeers,

    #[error("connection {0} is not known to the hub")]
    UnknownConnection(ConnectionId),

    #[error("outbound queue of connection {0} is full or closed")]
    QueueFull(ConnectionId),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The remote answered with an error pong.
    #[error("peer replied with {0}")]
    Remote(ErrorBody),

    #[error("unexpected {0} reply")]
    UnexpectedReply(MessageType),

    #[error("connection closed by peer")]
    Closed,

    #[error("request timed out")]
    Timeout,

    #[error("handler failed: {0}")]
    Handler(String),
}
