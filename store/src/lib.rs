//! Abstract storage traits for the votechain ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The ledger works on serialized blocks and transactions plus the
//! UTXO deltas it computed, so backends never need to understand block
//! structure.

pub mod error;
pub mod ledger;
pub mod party;
pub mod pending;
pub mod utxo;

pub use error::StoreError;
pub use ledger::{BlockCommit, LedgerStore};
pub use party::{Party, PartyStore};
pub use pending::PendingTransaction;
pub use utxo::Utxo;
