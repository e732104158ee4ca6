//! UTXO ledger.
//!
//! Transactions move value between address hashes by consuming unspent
//! outputs; blocks bundle transactions into a singly-linked chain. This crate
//! builds, hashes and validates both, answers chain queries by walking
//! backwards from the tip, and owns the pending-transaction pool.
//!
//! ## Module overview
//!
//! - [`transaction`]: inputs, outputs, ids, signable spend payloads.
//! - [`block`]: block layout and hashing.
//! - [`validation`]: transaction and block validation rules.
//! - [`ledger`]: the [`Ledger`] over a [`votechain_store::LedgerStore`].
//! - [`genesis`]: genesis block from authority-signed grants.
//! - [`vote`]: ballot casting.
//! - [`error`]: ledger error types.

pub mod block;
pub mod error;
pub mod genesis;
pub mod ledger;
pub mod transaction;
pub mod validation;
pub mod vote;

pub use block::{Block, Body, Header, Metadata};
pub use error::LedgerError;
pub use genesis::{create_genesis_block, verify_genesis, GenesisGrant};
pub use ledger::{ChainIter, Ledger};
pub use transaction::{Input, Output, SpendPayload, Transaction};
pub use validation::{UtxoView, Validation};
