//! Fundamental types for the votechain ledger.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! hashes, address hashes, output references, keys, timestamps, node roles and
//! protocol parameters.

pub mod error;
pub mod hash;
pub mod keys;
pub mod node;
pub mod outpoint;
pub mod params;
pub mod time;

pub use error::TypesError;
pub use hash::{AddressHash, BlockHash, TxId, TxSetHash};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use node::NodeType;
pub use outpoint::OutPoint;
pub use params::ProtocolParams;
pub use time::Timestamp;
