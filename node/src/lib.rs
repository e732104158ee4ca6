//! votechain node.
//!
//! Ties the pieces together:
//! - a [`votechain_ledger::Ledger`] over LMDB storage
//! - message handlers for chain queries, registration, forging and block
//!   acceptance, served on every peer connection
//! - on the authority: genesis, ballot parties and the forging timer
//! - on a regular node: catch-up with the authority and registration with
//!   the authority and every peer it knows
//! - the HTTP API, logging, metrics and graceful shutdown

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;
pub mod sync;
pub mod transport;

pub use config::{GenesisConfig, NodeConfig};
pub use error::NodeError;
pub use handlers::{build_router, NodeContext};
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::VoteNode;
pub use shutdown::ShutdownController;
pub use sync::catch_up;
pub use transport::HubTransport;
