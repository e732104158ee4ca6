//! Unspent transaction outputs.

use serde::{Deserialize, Serialize};
use votechain_types::{AddressHash, OutPoint};

/// An unspent output: where it lives, who owns it, how much it holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub out_point: OutPoint,
    pub address: AddressHash,
    pub value: u64,
}

impl Utxo {
    /// Sum of values, saturating.
    pub fn total(utxos: &[Utxo]) -> u64 {
        utxos.iter().fold(0u64, |acc, u| acc.saturating_add(u.value))
    }
}
