//! HTTP API of a votechain node.
//!
//! - `POST /vote`: submit a signed ballot
//! - `GET /parties`: parties with their vote tallies
//! - `GET /balance/{address}`: spendable outputs of an address
//! - `GET /metrics`: Prometheus text exposition

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ErrorResponse, RpcError};
pub use handlers::{BalanceResponse, PartyTally, RpcState, VoteRequest, VoteResponse};
pub use server::{router, RpcServer};
