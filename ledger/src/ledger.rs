//! The ledger: chain queries, block application and the pending pool over a
//! [`LedgerStore`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use votechain_store::{BlockCommit, LedgerStore, PendingTransaction, StoreError, Utxo};
use votechain_types::{AddressHash, BlockHash, OutPoint, ProtocolParams, TxId};

use crate::block::Block;
use crate::genesis::verify_genesis;
use crate::transaction::Transaction;
use crate::validation::{validate_block_with, validate_transaction_in, UtxoView, Validation};
use crate::LedgerError;

/// UTXO ledger for one network, identified by its authority address.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    authority: AddressHash,
    params: ProtocolParams,
    /// Serializes tip-changing writes within this process.
    write_lock: Mutex<()>,
    /// Held from choosing an output to queueing the transaction spending it.
    pending_lock: Mutex<()>,
    grantees: OnceLock<HashSet<AddressHash>>,
}

/// Walks the chain backwards from a starting hash to genesis.
pub struct ChainIter<'a> {
    ledger: &'a Ledger,
    next: BlockHash,
}

impl Iterator for ChainIter<'_> {
    type Item = Result<Block, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next.is_zero() {
            return None;
        }
        let hash = self.next;
        match self.ledger.get_block(&hash) {
            Ok(Some(block)) => {
                self.next = block.prev_hash();
                Some(Ok(block))
            }
            Ok(None) => {
                self.next = BlockHash::ZERO;
                Some(Err(LedgerError::MissingBlock(hash)))
            }
            Err(e) => {
                self.next = BlockHash::ZERO;
                Some(Err(e))
            }
        }
    }
}

impl UtxoView for Ledger {
    fn utxo(&self, out_point: &OutPoint) -> Result<Option<Utxo>, LedgerError> {
        Ok(self.store.get_utxo(out_point)?)
    }
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, authority: AddressHash, params: ProtocolParams) -> Self {
        Self {
            store,
            authority,
            params,
            write_lock: Mutex::new(()),
            pending_lock: Mutex::new(()),
            grantees: OnceLock::new(),
        }
    }

    pub fn authority(&self) -> &AddressHash {
        &self.authority
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    // ── Chain queries ───────────────────────────────────────────────────

    /// Current tip, [`BlockHash::ZERO`] for an empty chain.
    pub fn tip(&self) -> Result<BlockHash, LedgerError> {
        Ok(self.store.get_tip()?.unwrap_or(BlockHash::ZERO))
    }

    /// Block by hash. The zero hash is never found.
    pub fn get_block(&self, hash: &BlockHash) -> Result<Option<Block>, LedgerError> {
        if hash.is_zero() {
            return Ok(None);
        }
        match self.store.get_block(hash)? {
            Some(bytes) => Ok(Some(Block::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Blocks from `start` back to genesis.
    pub fn walk_from(&self, start: BlockHash) -> ChainIter<'_> {
        ChainIter {
            ledger: self,
            next: start,
        }
    }

    /// Blocks from the tip back to genesis.
    pub fn walk(&self) -> Result<ChainIter<'_>, LedgerError> {
        Ok(self.walk_from(self.tip()?))
    }

    /// Number of blocks from tip to genesis inclusive.
    pub fn height(&self) -> Result<u64, LedgerError> {
        let mut height = 0u64;
        for block in self.walk()? {
            block?;
            height += 1;
        }
        Ok(height)
    }

    /// Newest block satisfying `predicate`.
    pub fn find_block<F>(&self, mut predicate: F) -> Result<Option<Block>, LedgerError>
    where
        F: FnMut(&Block) -> bool,
    {
        for block in self.walk()? {
            let block = block?;
            if predicate(&block) {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }

    /// Hashes after `to` (exclusive) up to `from` (inclusive), oldest first.
    ///
    /// Empty when `from` is zero or equals `to`. When `to` is not an ancestor
    /// of `from`, the whole chain below `from` is returned.
    pub fn get_missing_blocks(
        &self,
        from: BlockHash,
        to: BlockHash,
    ) -> Result<Vec<BlockHash>, LedgerError> {
        let mut missing = Vec::new();
        let mut current = from;
        while !current.is_zero() && current != to {
            missing.push(current);
            let block = self
                .get_block(&current)?
                .ok_or(LedgerError::MissingBlock(current))?;
            current = block.prev_hash();
        }
        missing.reverse();
        Ok(missing)
    }

    /// Whether `address` received a grant in the genesis block.
    ///
    /// Base transactions only ever appear in genesis, so the grantee set is
    /// read once and kept for the life of the ledger.
    pub fn is_known_address(&self, address: &AddressHash) -> Result<bool, LedgerError> {
        if let Some(grantees) = self.grantees.get() {
            return Ok(grantees.contains(address));
        }
        let mut genesis = None;
        for block in self.walk()? {
            genesis = Some(block?);
        }
        let Some(genesis) = genesis else {
            return Ok(false);
        };
        let grantees: HashSet<AddressHash> = genesis
            .transactions()
            .iter()
            .filter(|tx| tx.is_base())
            .flat_map(|tx| tx.outputs.iter().map(|o| o.recipient))
            .collect();
        Ok(self.grantees.get_or_init(|| grantees).contains(address))
    }

    // ── Balances ────────────────────────────────────────────────────────

    pub fn utxos(&self, address: &AddressHash) -> Result<Vec<Utxo>, LedgerError> {
        Ok(self.store.get_utxos_by_address(address)?)
    }

    pub fn balance(&self, address: &AddressHash) -> Result<u64, LedgerError> {
        Ok(Utxo::total(&self.utxos(address)?))
    }

    /// Unspent outputs of `address` that no pending transaction consumes yet.
    pub fn spendable_utxos(&self, address: &AddressHash) -> Result<Vec<Utxo>, LedgerError> {
        let reserved = self.pending_out_points()?;
        Ok(self
            .utxos(address)?
            .into_iter()
            .filter(|u| !reserved.contains(&u.out_point))
            .collect())
    }

    // ── Validation ──────────────────────────────────────────────────────

    pub fn validate_transaction(&self, tx: &Transaction) -> Result<Validation, LedgerError> {
        validate_transaction_in(tx, self, &mut HashSet::new())
    }

    pub fn validate_block(
        &self,
        block: &Block,
        claimed_sender: &AddressHash,
    ) -> Result<Validation, LedgerError> {
        validate_block_with(block, claimed_sender, &self.authority, &self.params, self)
    }

    // ── Writes ──────────────────────────────────────────────────────────

    fn commit_for(block: &Block) -> Result<BlockCommit, LedgerError> {
        let transactions = block.transactions();
        Ok(BlockCommit {
            hash: block.hash(),
            block: block.to_bytes()?,
            spent: transactions.iter().flat_map(|t| t.spent_out_points()).collect(),
            created: transactions.iter().flat_map(|t| t.created_utxos()).collect(),
            included: transactions.iter().map(|t| t.id).collect(),
        })
    }

    /// Store the genesis block after checking it is authority-signed.
    pub fn put_genesis(&self, block: &Block) -> Result<BlockHash, LedgerError> {
        if let Validation::Invalid(reason) = verify_genesis(block, &self.authority)? {
            return Err(LedgerError::InvalidGenesis(reason));
        }
        let commit = Self::commit_for(block)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let tip = self.store.put_genesis(&commit)?;
        tracing::info!(hash = %tip, grants = block.body.count, "genesis stored");
        Ok(tip)
    }

    /// Apply `block` on top of the tip: retire its inputs, create its outputs,
    /// drop its transactions from the pending pool, move the tip.
    ///
    /// Does not run [`Ledger::validate_block`]; callers validate first.
    pub fn append_block(&self, block: &Block) -> Result<BlockHash, LedgerError> {
        let commit = Self::commit_for(block)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let tip = self.tip()?;
        if block.prev_hash() != tip {
            return Err(LedgerError::NotOnTip {
                block: block.hash(),
                tip,
            });
        }
        match self.store.append_block(&commit) {
            Ok(hash) => {
                tracing::debug!(hash = %hash, transactions = block.body.count, "block appended");
                Ok(hash)
            }
            Err(StoreError::Conflict(msg)) => Err(LedgerError::DoubleSpend(msg)),
            Err(e) => Err(e.into()),
        }
    }

    // ── Pending pool ────────────────────────────────────────────────────

    pub(crate) fn lock_pending(&self) -> MutexGuard<'_, ()> {
        self.pending_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `tx` to the pool. Returns `false` when it was already pending.
    pub fn put_pending(&self, tx: &Transaction) -> Result<bool, LedgerError> {
        let _guard = self.lock_pending();
        self.put_pending_locked(tx)
    }

    /// [`Ledger::put_pending`] for callers already holding the pool lock.
    pub(crate) fn put_pending_locked(&self, tx: &Transaction) -> Result<bool, LedgerError> {
        if !tx.id_matches()? {
            return Err(LedgerError::InvalidTransaction(format!(
                "id {} does not match content",
                tx.id
            )));
        }
        if tx.is_base() {
            return Err(LedgerError::InvalidTransaction(format!(
                "base transaction {} outside genesis",
                tx.id
            )));
        }
        if self.store.contains_pending_transaction(&tx.id)? {
            return Ok(false);
        }
        self.store.put_pending_transaction(&PendingTransaction {
            id: tx.id,
            timestamp: tx.timestamp,
            payload: tx.to_bytes()?,
        })?;
        Ok(true)
    }

    /// Pending transactions, oldest first. Undecodable entries are dropped.
    pub fn pending_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        let mut transactions = Vec::new();
        for pending in self.store.list_pending_transactions()? {
            match Transaction::from_bytes(&pending.payload) {
                Ok(tx) => transactions.push(tx),
                Err(e) => {
                    tracing::warn!(id = %pending.id, error = %e, "dropping undecodable pending transaction");
                    self.store.delete_pending_transaction(&pending.id)?;
                }
            }
        }
        Ok(transactions)
    }

    pub fn delete_pending(&self, id: &TxId) -> Result<(), LedgerError> {
        Ok(self.store.delete_pending_transaction(id)?)
    }

    pub fn is_pending(&self, id: &TxId) -> Result<bool, LedgerError> {
        Ok(self.store.contains_pending_transaction(id)?)
    }

    /// Outputs consumed by some pending transaction.
    pub fn pending_out_points(&self) -> Result<HashSet<OutPoint>, LedgerError> {
        Ok(self
            .pending_transactions()?
            .iter()
            .flat_map(|t| t.spent_out_points())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::{create_genesis_block, GenesisGrant};
    use crate::transaction::{Output, SpendPayload};
    use votechain_crypto::{Ed25519Signer, SigningAdapter};
    use votechain_nullables::NullStore;
    use votechain_types::Timestamp;

    struct Fixture {
        ledger: Ledger,
        store: Arc<NullStore>,
        authority: Ed25519Signer,
        alice: Ed25519Signer,
    }

    fn fixture() -> Fixture {
        let authority = Ed25519Signer::from_seed(&[0xA0; 32]);
        let alice = Ed25519Signer::from_seed(&[1; 32]);
        let store = Arc::new(NullStore::new());
        let ledger = Ledger::new(store.clone(), authority.address(), ProtocolParams::default());
        let genesis = create_genesis_block(
            &authority,
            &[GenesisGrant {
                address: alice.address(),
                value: 100,
            }],
            Timestamp::new(1),
            ledger.params(),
        )
        .unwrap();
        ledger.put_genesis(&genesis).unwrap();
        Fixture {
            ledger,
            store,
            authority,
            alice,
        }
    }

    fn pay(from: &Ed25519Signer, utxo: &Utxo, to: AddressHash, amount: u64, ts: u64) -> Transaction {
        let input = SpendPayload {
            sender: from.address(),
            recipient: to,
            value: utxo.value,
        }
        .sign_input(Some(utxo.out_point), from)
        .unwrap();
        let mut outputs = vec![Output {
            value: amount,
            recipient: to,
        }];
        if utxo.value > amount {
            outputs.push(Output {
                value: utxo.value - amount,
                recipient: from.address(),
            });
        }
        Transaction::new_at(vec![input], outputs, Timestamp::new(ts)).unwrap()
    }

    fn block_on_tip(ledger: &Ledger, txs: Vec<Transaction>, ts: u64) -> Block {
        Block::new_at(ledger.tip().unwrap(), txs, Timestamp::new(ts), ledger.params()).unwrap()
    }

    #[test]
    fn empty_chain() {
        let store = Arc::new(NullStore::new());
        let ledger = Ledger::new(store, AddressHash::ZERO, ProtocolParams::default());
        assert_eq!(ledger.tip().unwrap(), BlockHash::ZERO);
        assert_eq!(ledger.height().unwrap(), 0);
        assert!(ledger.get_block(&BlockHash::ZERO).unwrap().is_none());
        assert!(ledger
            .get_missing_blocks(BlockHash::ZERO, BlockHash::ZERO)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn genesis_grants_balance() {
        let f = fixture();
        assert_eq!(f.ledger.height().unwrap(), 1);
        assert_eq!(f.ledger.balance(&f.alice.address()).unwrap(), 100);
        assert!(f.ledger.is_known_address(&f.alice.address()).unwrap());
        assert!(!f.ledger.is_known_address(&f.authority.address()).unwrap());
    }

    #[test]
    fn append_moves_value_and_retires_pending() {
        let f = fixture();
        let bob = AddressHash::new([0xB0; 32]);
        let utxo = f.ledger.utxos(&f.alice.address()).unwrap()[0];
        let tx = pay(&f.alice, &utxo, bob, 1, 2);
        assert!(f.ledger.put_pending(&tx).unwrap());
        assert!(!f.ledger.put_pending(&tx).unwrap());

        let block = block_on_tip(&f.ledger, vec![tx.clone()], 3);
        f.ledger.append_block(&block).unwrap();

        assert_eq!(f.ledger.balance(&f.alice.address()).unwrap(), 99);
        assert_eq!(f.ledger.balance(&bob).unwrap(), 1);
        assert!(!f.ledger.is_pending(&tx.id).unwrap());
        assert_eq!(f.ledger.height().unwrap(), 2);
        assert_eq!(f.store.total_unspent(), 100);
    }

    #[test]
    fn double_spend_across_blocks_is_rejected() {
        let f = fixture();
        let utxo = f.ledger.utxos(&f.alice.address()).unwrap()[0];
        let first = pay(&f.alice, &utxo, AddressHash::new([0xB0; 32]), 1, 2);
        let second = pay(&f.alice, &utxo, AddressHash::new([0xC0; 32]), 2, 3);
        assert!(f.ledger.validate_transaction(&second).unwrap().is_valid());

        f.ledger
            .append_block(&block_on_tip(&f.ledger, vec![first], 4))
            .unwrap();
        assert!(!f.ledger.validate_transaction(&second).unwrap().is_valid());

        let result = f.ledger.append_block(&block_on_tip(&f.ledger, vec![second], 5));
        assert!(matches!(result, Err(LedgerError::DoubleSpend(_))));
        assert_eq!(f.ledger.height().unwrap(), 2);
    }

    #[test]
    fn append_requires_current_tip() {
        let f = fixture();
        let stale = Block::new_at(
            BlockHash::new([9; 32]),
            vec![],
            Timestamp::new(2),
            f.ledger.params(),
        )
        .unwrap();
        assert!(matches!(
            f.ledger.append_block(&stale),
            Err(LedgerError::NotOnTip { .. })
        ));
    }

    #[test]
    fn missing_blocks_are_oldest_first() {
        let f = fixture();
        let genesis = f.ledger.tip().unwrap();
        let mut hashes = vec![];
        let mut utxo = f.ledger.utxos(&f.alice.address()).unwrap()[0];
        for i in 0..3u64 {
            let tx = pay(&f.alice, &utxo, AddressHash::new([0xB0; 32]), 1, 10 + i);
            utxo = tx.created_utxos()[1];
            let block = block_on_tip(&f.ledger, vec![tx], 20 + i);
            hashes.push(f.ledger.append_block(&block).unwrap());
        }
        let tip = f.ledger.tip().unwrap();
        assert_eq!(f.ledger.get_missing_blocks(tip, genesis).unwrap(), hashes);
        assert_eq!(f.ledger.get_missing_blocks(tip, hashes[0]).unwrap(), hashes[1..].to_vec());
        assert!(f.ledger.get_missing_blocks(tip, tip).unwrap().is_empty());

        let mut everything = vec![genesis];
        everything.extend(hashes);
        assert_eq!(
            f.ledger.get_missing_blocks(tip, BlockHash::ZERO).unwrap(),
            everything
        );
    }

    #[test]
    fn find_block_returns_newest_match() {
        let f = fixture();
        let found = f
            .ledger
            .find_block(|b| b.prev_hash().is_zero())
            .unwrap()
            .unwrap();
        assert_eq!(found.hash(), f.ledger.tip().unwrap());
        assert!(f.ledger.find_block(|_| false).unwrap().is_none());
    }

    #[test]
    fn spendable_excludes_pending_inputs() {
        let f = fixture();
        let utxo = f.ledger.utxos(&f.alice.address()).unwrap()[0];
        f.ledger
            .put_pending(&pay(&f.alice, &utxo, AddressHash::new([0xB0; 32]), 1, 2))
            .unwrap();
        assert!(f.ledger.spendable_utxos(&f.alice.address()).unwrap().is_empty());
        assert_eq!(f.ledger.balance(&f.alice.address()).unwrap(), 100);
    }

    #[test]
    fn base_grant_cannot_enter_the_pending_pool() {
        let f = fixture();
        let grant = Transaction::new_base(
            &f.authority,
            f.alice.address(),
            5,
            Timestamp::new(9),
        )
        .unwrap();
        assert!(matches!(
            f.ledger.put_pending(&grant),
            Err(LedgerError::InvalidTransaction(_))
        ));
        assert!(!f.ledger.is_pending(&grant.id).unwrap());
    }

    #[test]
    fn grantees_are_read_once_from_genesis() {
        let f = fixture();
        assert!(f.ledger.is_known_address(&f.alice.address()).unwrap());
        assert!(!f.ledger.is_known_address(&AddressHash::new([0xB0; 32])).unwrap());

        f.store.set_unavailable(true);
        assert!(f.ledger.is_known_address(&f.alice.address()).unwrap());
    }

    #[test]
    fn empty_chain_knows_nobody() {
        let authority = Ed25519Signer::from_seed(&[0xA0; 32]);
        let ledger = Ledger::new(
            Arc::new(NullStore::new()),
            authority.address(),
            ProtocolParams::default(),
        );
        assert!(!ledger.is_known_address(&authority.address()).unwrap());
    }

    #[test]
    fn storage_failure_is_an_error_not_a_rejection() {
        let f = fixture();
        let utxo = f.ledger.utxos(&f.alice.address()).unwrap()[0];
        let tx = pay(&f.alice, &utxo, AddressHash::new([0xB0; 32]), 1, 2);
        f.store.set_unavailable(true);
        let err = f.ledger.validate_transaction(&tx).unwrap_err();
        assert!(err.is_storage());
    }
}
