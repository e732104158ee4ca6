//! Pending-pool records.

use votechain_types::{Timestamp, TxId};

/// A transaction waiting to be embedded in a block, as stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub id: TxId,
    pub timestamp: Timestamp,
    /// Serialized transaction.
    pub payload: Vec<u8>,
}
