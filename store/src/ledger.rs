//! Ledger storage: blocks, the tip pointer, both UTXO indices and the
//! pending-transaction pool.

use crate::{PendingTransaction, StoreError, Utxo};
use votechain_types::{AddressHash, BlockHash, OutPoint, TxId};

/// Everything one block changes, written as a single atomic unit.
#[derive(Clone, Debug, Default)]
pub struct BlockCommit {
    pub hash: BlockHash,
    /// Serialized block.
    pub block: Vec<u8>,
    /// Outputs consumed by the block's inputs. Each must currently be unspent.
    pub spent: Vec<OutPoint>,
    /// Outputs created by the block's transactions.
    pub created: Vec<Utxo>,
    /// Ids of the embedded transactions, removed from the pending pool.
    pub included: Vec<TxId>,
}

/// The ledger store adapter.
///
/// `put_genesis` and `append_block` apply a [`BlockCommit`] atomically: the
/// block, the new tip, both UTXO indices and the pending-pool removals become
/// visible together or not at all.
pub trait LedgerStore: Send + Sync {
    /// Current tip, or `None` for an empty chain.
    fn get_tip(&self) -> Result<Option<BlockHash>, StoreError>;

    /// Store the first block. Fails with [`StoreError::Duplicate`] if a tip exists.
    fn put_genesis(&self, commit: &BlockCommit) -> Result<BlockHash, StoreError>;

    /// Store a block on top of the current tip.
    ///
    /// Fails with [`StoreError::Conflict`] without writing anything when any
    /// entry of `commit.spent` is not an unspent output.
    fn append_block(&self, commit: &BlockCommit) -> Result<BlockHash, StoreError>;

    /// Serialized block by hash.
    fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError>;

    /// Unspent outputs owned by `address`, ordered by outpoint.
    fn get_utxos_by_address(&self, address: &AddressHash) -> Result<Vec<Utxo>, StoreError>;

    /// One unspent output by reference.
    fn get_utxo(&self, out_point: &OutPoint) -> Result<Option<Utxo>, StoreError>;

    /// Add a transaction to the pending pool. Re-inserting an id overwrites it.
    fn put_pending_transaction(&self, pending: &PendingTransaction) -> Result<(), StoreError>;

    fn contains_pending_transaction(&self, id: &TxId) -> Result<bool, StoreError>;

    /// Pending transactions ordered by timestamp, then id.
    fn list_pending_transactions(&self) -> Result<Vec<PendingTransaction>, StoreError>;

    /// Remove a transaction from the pool. Removing an absent id is not an error.
    fn delete_pending_transaction(&self, id: &TxId) -> Result<(), StoreError>;
}
