//! Stake forging consensus.
//!
//! The authority periodically asks one random peer to forge. The chosen
//! forger bonds half of its spendable balance to the authority in a stake
//! transaction, bundles it with the pending pool into a block and broadcasts
//! the block. Receivers either accept it, ignore it as stale, or punish the
//! forger by keeping its bond.
//!
//! ## Module overview
//!
//! - [`stake`]: stake and return-stake transactions.
//! - [`forger`]: block assembly for a forge request.
//! - [`acceptance`]: verdicts on received blocks.
//! - [`scheduler`]: the authority's forging rounds.
//! - [`error`]: consensus error types.

pub mod acceptance;
pub mod error;
pub mod forger;
pub mod scheduler;
pub mod stake;

pub use acceptance::{BlockAcceptor, BlockVerdict};
pub use error::ConsensusError;
pub use forger::{ForgeOutcome, Forger};
pub use scheduler::{ForgerScheduler, RoundOutcome, RoundTransport};
pub use stake::{new_return_stake_transaction, new_stake_transaction};
