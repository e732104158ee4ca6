//! Nullable infrastructure for deterministic testing.
//!
//! Storage is abstracted behind the `votechain-store` traits. This crate
//! provides a test-friendly implementation that:
//! - Never touches the filesystem
//! - Can be switched into a failing mode to exercise storage-error paths
//!
//! Usage: swap the LMDB store for [`NullStore`] in tests.

pub mod store;

pub use store::NullStore;
