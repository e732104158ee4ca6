//! Protocol parameters shared by every node of one network.

use serde::{Deserialize, Serialize};

/// Magic number stamped into every block's metadata.
pub const MAGIC_NUMBER: u32 = 0x100;

/// Current block format version.
pub const BLOCK_VERSION: u32 = 0;

/// Tunable protocol values. All nodes of one network must agree on them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Value moved to the recipient by one ballot.
    pub vote_value: u64,

    /// Smallest stake a forger may bond. A forger whose half-balance is
    /// below this cannot forge.
    pub min_bond: u64,

    /// Cap on transactions per forged block, the stake transaction included.
    pub max_block_transactions: usize,

    pub magic_number: u32,

    pub block_version: u32,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            vote_value: 1,
            min_bond: 1,
            max_block_transactions: 256,
            magic_number: MAGIC_NUMBER,
            block_version: BLOCK_VERSION,
        }
    }
}
