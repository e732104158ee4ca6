//! Peer networking for votechain nodes.
//!
//! A [`Hub`] tracks live connections and the peers registered on them, a
//! [`Router`] maps each message type to its [`Handler`], and every socket is
//! served by a reader/writer task pair from [`spawn_connection`].
//! [`PeerClient`] covers outbound request/response exchanges.

pub mod authorizer;
pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod hub;
pub mod router;

pub use authorizer::{
    Authorized, Authorizer, HandlerExt, KnownAddressAuthorizer, PublicKeyAuthorizer,
    SignatureAuthorizer,
};
pub use client::PeerClient;
pub use connection::{spawn_connection, Connection, DEFAULT_QUEUE_CAPACITY};
pub use error::NetworkError;
pub use hub::{ConnectionId, Hub, PeerInfo};
pub use router::{Handler, Router};
