//! Reference to a specific output of a prior transaction.

use crate::hash::TxId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `(transaction id, output index)` pair identifying one output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: TxId,
    pub index: u32,
}

impl OutPoint {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        Self { tx_id, index }
    }

    /// 36-byte big-endian key: tx id followed by the output index.
    pub fn to_key(&self) -> [u8; 36] {
        let mut key = [0u8; 36];
        key[..32].copy_from_slice(self.tx_id.as_bytes());
        key[32..].copy_from_slice(&self.index.to_be_bytes());
        key
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}
