//! Write batching: groups every write of one block commit into a single LMDB
//! write transaction.
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).

use std::collections::HashSet;

use heed::RwTxn;

use votechain_store::{BlockCommit, PendingTransaction, Utxo};
use votechain_types::{AddressHash, BlockHash, OutPoint, TxId};

use crate::environment::{LmdbStore, TIP_KEY};
use crate::LmdbError;

/// Outcome of checking a commit's spends against the UTXO set.
pub enum SpendCheck {
    Ok,
    Conflict(OutPoint),
}

pub(crate) fn address_key(address: &AddressHash, out_point: &OutPoint) -> [u8; 68] {
    let mut key = [0u8; 68];
    key[..32].copy_from_slice(address.as_bytes());
    key[32..].copy_from_slice(&out_point.to_key());
    key
}

pub(crate) fn pending_order_key(pending: &PendingTransaction) -> [u8; 40] {
    order_key(&pending.timestamp.to_be_bytes(), &pending.id)
}

fn order_key(timestamp: &[u8], id: &TxId) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..8].copy_from_slice(timestamp);
    key[8..].copy_from_slice(id.as_bytes());
    key
}

pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    store: &'a LmdbStore,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(store: &'a LmdbStore) -> Result<Self, LmdbError> {
        let txn = store.env.write_txn()?;
        Ok(Self { txn, store })
    }

    pub fn tip(&self) -> Result<Option<BlockHash>, LmdbError> {
        self.store.tip_in(&self.txn)
    }

    /// Every spent outpoint must exist and appear once.
    pub fn check_spends(&self, spent: &[OutPoint]) -> Result<SpendCheck, LmdbError> {
        let mut seen = HashSet::with_capacity(spent.len());
        for out_point in spent {
            if !seen.insert(*out_point) {
                return Ok(SpendCheck::Conflict(*out_point));
            }
            if self
                .store
                .utxo_db
                .get(&self.txn, &out_point.to_key())?
                .is_none()
            {
                return Ok(SpendCheck::Conflict(*out_point));
            }
        }
        Ok(SpendCheck::Ok)
    }

    /// Write the block, the UTXO deltas, the pending removals and the new tip.
    pub fn apply_commit(&mut self, commit: &BlockCommit) -> Result<(), LmdbError> {
        for out_point in &commit.spent {
            self.spend(out_point)?;
        }
        for utxo in &commit.created {
            self.put_utxo(utxo)?;
        }
        for id in &commit.included {
            self.delete_pending(id)?;
        }
        self.store
            .blocks_db
            .put(&mut self.txn, commit.hash.as_bytes(), &commit.block)?;
        self.store
            .meta_db
            .put(&mut self.txn, TIP_KEY, commit.hash.as_bytes())?;
        Ok(())
    }

    fn spend(&mut self, out_point: &OutPoint) -> Result<(), LmdbError> {
        let key = out_point.to_key();
        let Some(bytes) = self.store.utxo_db.get(&self.txn, &key)? else {
            return Ok(());
        };
        let utxo: Utxo = bincode::deserialize(bytes)?;
        self.store.utxo_db.delete(&mut self.txn, &key)?;
        self.store
            .address_db
            .delete(&mut self.txn, &address_key(&utxo.address, out_point))?;
        Ok(())
    }

    fn put_utxo(&mut self, utxo: &Utxo) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(utxo)?;
        self.store
            .utxo_db
            .put(&mut self.txn, &utxo.out_point.to_key(), &bytes)?;
        self.store.address_db.put(
            &mut self.txn,
            &address_key(&utxo.address, &utxo.out_point),
            b"",
        )?;
        Ok(())
    }

    pub fn put_pending(&mut self, pending: &PendingTransaction) -> Result<(), LmdbError> {
        // Replace any earlier entry so the order index never holds a stale key.
        self.delete_pending(&pending.id)?;
        let mut value = Vec::with_capacity(8 + pending.payload.len());
        value.extend_from_slice(&pending.timestamp.to_be_bytes());
        value.extend_from_slice(&pending.payload);
        self.store
            .pending_db
            .put(&mut self.txn, pending.id.as_bytes(), &value)?;
        self.store
            .pending_order_db
            .put(&mut self.txn, &pending_order_key(pending), b"")?;
        Ok(())
    }

    pub fn delete_pending(&mut self, id: &TxId) -> Result<(), LmdbError> {
        let timestamp = match self.store.pending_db.get(&self.txn, id.as_bytes())? {
            Some(value) if value.len() >= 8 => {
                let mut ts = [0u8; 8];
                ts.copy_from_slice(&value[..8]);
                ts
            }
            Some(_) => return Err(LmdbError::Corrupt(format!("pending record {id}"))),
            None => return Ok(()),
        };
        self.store.pending_db.delete(&mut self.txn, id.as_bytes())?;
        self.store
            .pending_order_db
            .delete(&mut self.txn, &order_key(&timestamp, id))?;
        Ok(())
    }

    pub fn commit(self) -> Result<(), LmdbError> {
        self.txn.commit()?;
        Ok(())
    }
}
