//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use votechain_store::{
    BlockCommit, LedgerStore, Party, PartyStore, PendingTransaction, StoreError, Utxo,
};
use votechain_types::{AddressHash, BlockHash, OutPoint, Timestamp, TxId};

#[derive(Default)]
struct State {
    tip: Option<BlockHash>,
    blocks: HashMap<BlockHash, Vec<u8>>,
    utxos: BTreeMap<OutPoint, Utxo>,
    by_address: BTreeMap<AddressHash, BTreeSet<OutPoint>>,
    pending: HashMap<TxId, PendingTransaction>,
    parties: BTreeMap<AddressHash, Party>,
}

impl State {
    fn apply(&mut self, commit: &BlockCommit) {
        for out_point in &commit.spent {
            if let Some(utxo) = self.utxos.remove(out_point) {
                if let Some(set) = self.by_address.get_mut(&utxo.address) {
                    set.remove(out_point);
                }
            }
        }
        for utxo in &commit.created {
            self.utxos.insert(utxo.out_point, *utxo);
            self.by_address
                .entry(utxo.address)
                .or_default()
                .insert(utxo.out_point);
        }
        for id in &commit.included {
            self.pending.remove(id);
        }
        self.blocks.insert(commit.hash, commit.block.clone());
        self.tip = Some(commit.hash);
    }
}

/// An in-memory ledger + party store for testing.
///
/// All state sits behind one mutex, so a commit is trivially atomic.
#[derive(Default)]
pub struct NullStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Backend`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored blocks.
    pub fn block_count(&self) -> usize {
        self.state.lock().unwrap().blocks.len()
    }

    /// Sum of every unspent output.
    pub fn total_unspent(&self) -> u64 {
        self.state.lock().unwrap().utxos.values().map(|u| u.value).sum()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store unavailable".into()));
        }
        Ok(())
    }
}

impl LedgerStore for NullStore {
    fn get_tip(&self) -> Result<Option<BlockHash>, StoreError> {
        self.check()?;
        Ok(self.state.lock().unwrap().tip)
    }

    fn put_genesis(&self, commit: &BlockCommit) -> Result<BlockHash, StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        if state.tip.is_some() {
            return Err(StoreError::Duplicate("genesis already stored".into()));
        }
        state.apply(commit);
        Ok(commit.hash)
    }

    fn append_block(&self, commit: &BlockCommit) -> Result<BlockHash, StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let mut seen = BTreeSet::new();
        for out_point in &commit.spent {
            if !seen.insert(*out_point) || !state.utxos.contains_key(out_point) {
                return Err(StoreError::Conflict(format!("output {out_point} is not unspent")));
            }
        }
        state.apply(commit);
        Ok(commit.hash)
    }

    fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        Ok(self.state.lock().unwrap().blocks.get(hash).cloned())
    }

    fn get_utxos_by_address(&self, address: &AddressHash) -> Result<Vec<Utxo>, StoreError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .by_address
            .get(address)
            .map(|set| set.iter().filter_map(|op| state.utxos.get(op)).copied().collect())
            .unwrap_or_default())
    }

    fn get_utxo(&self, out_point: &OutPoint) -> Result<Option<Utxo>, StoreError> {
        self.check()?;
        Ok(self.state.lock().unwrap().utxos.get(out_point).copied())
    }

    fn put_pending_transaction(&self, pending: &PendingTransaction) -> Result<(), StoreError> {
        self.check()?;
        self.state
            .lock()
            .unwrap()
            .pending
            .insert(pending.id, pending.clone());
        Ok(())
    }

    fn contains_pending_transaction(&self, id: &TxId) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.state.lock().unwrap().pending.contains_key(id))
    }

    fn list_pending_transactions(&self) -> Result<Vec<PendingTransaction>, StoreError> {
        self.check()?;
        let mut all: Vec<PendingTransaction> =
            self.state.lock().unwrap().pending.values().cloned().collect();
        all.sort_by_key(|p| (p.timestamp, p.id));
        Ok(all)
    }

    fn delete_pending_transaction(&self, id: &TxId) -> Result<(), StoreError> {
        self.check()?;
        self.state.lock().unwrap().pending.remove(id);
        Ok(())
    }
}

impl PartyStore for NullStore {
    fn put_party(&self, party: &Party) -> Result<(), StoreError> {
        self.check()?;
        self.state
            .lock()
            .unwrap()
            .parties
            .insert(party.address, party.clone());
        Ok(())
    }

    fn list_parties(&self) -> Result<Vec<Party>, StoreError> {
        self.check()?;
        Ok(self.state.lock().unwrap().parties.values().cloned().collect())
    }
}
