//! LMDB implementation of [`LedgerStore`].

use votechain_store::{BlockCommit, LedgerStore, PendingTransaction, StoreError, Utxo};
use votechain_types::{AddressHash, BlockHash, OutPoint, Timestamp, TxId};

use crate::environment::LmdbStore;
use crate::write_batch::SpendCheck;
use crate::LmdbError;

fn decode_pending(id: TxId, value: &[u8]) -> Result<PendingTransaction, LmdbError> {
    if value.len() < 8 {
        return Err(LmdbError::Corrupt(format!("pending record {id}")));
    }
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&value[..8]);
    Ok(PendingTransaction {
        id,
        timestamp: Timestamp::new(u64::from_be_bytes(ts)),
        payload: value[8..].to_vec(),
    })
}

impl LedgerStore for LmdbStore {
    fn get_tip(&self) -> Result<Option<BlockHash>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.tip_in(&rtxn)?)
    }

    fn put_genesis(&self, commit: &BlockCommit) -> Result<BlockHash, StoreError> {
        let mut batch = self.write_batch()?;
        if batch.tip()?.is_some() {
            return Err(StoreError::Duplicate("genesis already stored".into()));
        }
        batch.apply_commit(commit)?;
        batch.commit()?;
        tracing::info!(hash = %commit.hash, "stored genesis block");
        Ok(commit.hash)
    }

    fn append_block(&self, commit: &BlockCommit) -> Result<BlockHash, StoreError> {
        let mut batch = self.write_batch()?;
        if let SpendCheck::Conflict(out_point) = batch.check_spends(&commit.spent)? {
            return Err(StoreError::Conflict(format!(
                "output {out_point} is not unspent"
            )));
        }
        batch.apply_commit(commit)?;
        batch.commit()?;
        Ok(commit.hash)
    }

    fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let block = self
            .blocks_db
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(block.map(<[u8]>::to_vec))
    }

    fn get_utxos_by_address(&self, address: &AddressHash) -> Result<Vec<Utxo>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self
            .address_db
            .prefix_iter(&rtxn, address.as_bytes())
            .map_err(LmdbError::from)?;
        let mut utxos = Vec::new();
        for entry in iter {
            let (key, _) = entry.map_err(LmdbError::from)?;
            let out_point_key = &key[32..];
            let bytes = self
                .utxo_db
                .get(&rtxn, out_point_key)
                .map_err(LmdbError::from)?
                .ok_or_else(|| {
                    StoreError::Corruption("address index points at a missing utxo".into())
                })?;
            let utxo: Utxo = bincode::deserialize(bytes).map_err(LmdbError::from)?;
            utxos.push(utxo);
        }
        Ok(utxos)
    }

    fn get_utxo(&self, out_point: &OutPoint) -> Result<Option<Utxo>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .utxo_db
            .get(&rtxn, &out_point.to_key())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(bytes).map_err(LmdbError::from)?,
            )),
            None => Ok(None),
        }
    }

    fn put_pending_transaction(&self, pending: &PendingTransaction) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        batch.put_pending(pending)?;
        batch.commit()?;
        Ok(())
    }

    fn contains_pending_transaction(&self, id: &TxId) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self
            .pending_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?
            .is_some())
    }

    fn list_pending_transactions(&self) -> Result<Vec<PendingTransaction>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.pending_order_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut all = Vec::new();
        for entry in iter {
            let (key, _) = entry.map_err(LmdbError::from)?;
            let id_bytes: [u8; 32] = key
                .get(8..)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| StoreError::Corruption("pending order key length".into()))?;
            let id = TxId::new(id_bytes);
            let value = self
                .pending_db
                .get(&rtxn, id.as_bytes())
                .map_err(LmdbError::from)?
                .ok_or_else(|| {
                    StoreError::Corruption(format!("order index points at missing pending {id}"))
                })?;
            all.push(decode_pending(id, value)?);
        }
        Ok(all)
    }

    fn delete_pending_transaction(&self, id: &TxId) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        batch.delete_pending(id)?;
        batch.commit()?;
        Ok(())
    }
}
