//! LMDB storage backend for the votechain ledger.
//!
//! Implements the storage traits from `votechain-store` using the `heed` LMDB
//! bindings. Every logical index maps to one named database inside a single
//! environment, so one write transaction covers a whole block commit.

pub mod environment;
pub mod error;
pub mod ledger;
pub mod party;
pub mod write_batch;

pub use environment::LmdbStore;
pub use error::LmdbError;
