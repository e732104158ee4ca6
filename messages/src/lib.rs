//! Signed push protocol spoken between votechain nodes.
//!
//! Every frame is a [`Ping`]: a [`MessageType`] tag, a JSON body, and the
//! sender's key and signature. Handlers answer with a [`Pong`], which the
//! transport signs before sending.

pub mod bodies;
pub mod envelope;
pub mod error;
pub mod error_body;
pub mod message_type;

pub use bodies::{
    BlockBody, BlockForgedBody, ForgeBlockBody, GetBlockBody, GetMissingBlocksBody, HeightBody,
    MissingBlocksBody, PeersBody, RegisterBody, TransactionBody,
};
pub use envelope::{Ping, Pong};
pub use error::MessageError;
pub use error_body::ErrorBody;
pub use message_type::MessageType;
