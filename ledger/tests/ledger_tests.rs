//! Ledger behaviour across several blocks: ballots, value conservation and
//! header integrity.

use std::sync::Arc;

use proptest::prelude::*;
use votechain_crypto::{Ed25519Signer, SigningAdapter};
use votechain_ledger::{
    create_genesis_block, Block, GenesisGrant, Ledger, LedgerError, SpendPayload,
};
use votechain_nullables::NullStore;
use votechain_types::{AddressHash, BlockHash, ProtocolParams, Timestamp};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn voter(seed: u8) -> Ed25519Signer {
    Ed25519Signer::from_seed(&[seed; 32])
}

fn party(tag: u8) -> AddressHash {
    AddressHash::new([0xE0 | tag; 32])
}

fn ledger_with(grants: &[(AddressHash, u64)]) -> (Ledger, Arc<NullStore>) {
    let authority = Ed25519Signer::from_seed(&[0xA0; 32]);
    let store = Arc::new(NullStore::new());
    let ledger = Ledger::new(store.clone(), authority.address(), ProtocolParams::default());
    let grants: Vec<GenesisGrant> = grants
        .iter()
        .map(|(address, value)| GenesisGrant {
            address: *address,
            value: *value,
        })
        .collect();
    let genesis =
        create_genesis_block(&authority, &grants, Timestamp::new(1), ledger.params()).unwrap();
    ledger.put_genesis(&genesis).unwrap();
    (ledger, store)
}

fn vote(ledger: &Ledger, who: &Ed25519Signer, to: AddressHash) -> Result<(), LedgerError> {
    let utxo = match ledger.spendable_utxos(&who.address())?.first() {
        Some(utxo) => *utxo,
        None => {
            return Err(LedgerError::InsufficientBalance {
                address: who.address(),
                available: 0,
            })
        }
    };
    let payload = SpendPayload {
        sender: who.address(),
        recipient: to,
        value: utxo.value,
    };
    let signature = who.sign(&payload.to_bytes()?);
    ledger.cast_vote(&who.address(), &to, &signature, &who.public_key())?;
    Ok(())
}

/// Bundle the whole pending pool into a block on the tip.
fn seal(ledger: &Ledger) {
    let pending = ledger.pending_transactions().unwrap();
    if pending.is_empty() {
        return;
    }
    let block = Block::new(ledger.tip().unwrap(), pending, ledger.params()).unwrap();
    ledger.append_block(&block).unwrap();
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn single_ballot_moves_one_token() {
    let alice = voter(1);
    let (ledger, _store) = ledger_with(&[(alice.address(), 100)]);

    vote(&ledger, &alice, party(1)).unwrap();
    seal(&ledger);

    assert_eq!(ledger.balance(&alice.address()).unwrap(), 99);
    assert_eq!(ledger.balance(&party(1)).unwrap(), 1);
    assert!(ledger.pending_transactions().unwrap().is_empty());
    assert_eq!(ledger.height().unwrap(), 2);
}

#[test]
fn double_spend_inside_one_block_is_refused() {
    let alice = voter(1);
    let (ledger, store) = ledger_with(&[(alice.address(), 10)]);
    let utxo = ledger.utxos(&alice.address()).unwrap()[0];

    let pay = |to: AddressHash, ts: u64| {
        let input = SpendPayload {
            sender: alice.address(),
            recipient: to,
            value: utxo.value,
        }
        .sign_input(Some(utxo.out_point), &alice)
        .unwrap();
        votechain_ledger::Transaction::new_at(
            vec![input],
            vec![votechain_ledger::Output {
                value: utxo.value,
                recipient: to,
            }],
            Timestamp::new(ts),
        )
        .unwrap()
    };
    let block = Block::new(
        ledger.tip().unwrap(),
        vec![pay(party(1), 2), pay(party(2), 3)],
        ledger.params(),
    )
    .unwrap();

    let result = ledger.append_block(&block);
    assert!(matches!(result, Err(LedgerError::DoubleSpend(_))));
    assert_eq!(ledger.height().unwrap(), 1);
    assert_eq!(store.total_unspent(), 10);
    assert_eq!(ledger.balance(&alice.address()).unwrap(), 10);
}

#[test]
fn missing_blocks_follow_the_chain() {
    let alice = voter(1);
    let (ledger, _store) = ledger_with(&[(alice.address(), 5)]);
    let genesis = ledger.tip().unwrap();
    for _ in 0..3 {
        vote(&ledger, &alice, party(1)).unwrap();
        seal(&ledger);
    }
    let missing = ledger
        .get_missing_blocks(ledger.tip().unwrap(), genesis)
        .unwrap();
    assert_eq!(missing.len(), 3);
    assert_eq!(*missing.last().unwrap(), ledger.tip().unwrap());
    let first = ledger.get_block(&missing[0]).unwrap().unwrap();
    assert_eq!(first.prev_hash(), genesis);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// However ballots and blocks interleave, the unspent total equals the
    /// genesis grants.
    #[test]
    fn value_is_conserved(steps in prop::collection::vec((0u8..3, 0u8..2, any::<bool>()), 1..20)) {
        let voters = [voter(1), voter(2), voter(3)];
        let grants: Vec<(AddressHash, u64)> =
            voters.iter().map(|v| (v.address(), 4)).collect();
        let (ledger, store) = ledger_with(&grants);

        for (who, to, seal_now) in steps {
            match vote(&ledger, &voters[who as usize], party(to)) {
                Ok(()) | Err(LedgerError::InsufficientBalance { .. }) => {}
                Err(e) => panic!("unexpected ballot error: {e}"),
            }
            if seal_now {
                seal(&ledger);
            }
            prop_assert_eq!(store.total_unspent(), 12);
        }
        seal(&ledger);
        let parties = ledger.balance(&party(0)).unwrap() + ledger.balance(&party(1)).unwrap();
        let voters_left: u64 = voters
            .iter()
            .map(|v| ledger.balance(&v.address()).unwrap())
            .sum();
        prop_assert_eq!(parties + voters_left, 12);
    }

    /// Flipping any single byte of the hashed header fields is detected.
    #[test]
    fn header_mutation_is_detected(field in 0usize..4, byte in 0usize..32, bit in 0u8..8) {
        let alice = voter(1);
        let (ledger, _store) = ledger_with(&[(alice.address(), 5)]);
        let mut block = ledger.get_block(&ledger.tip().unwrap()).unwrap().unwrap();
        let mask = 1u8 << bit;
        match field {
            0 => {
                let mut raw = *block.header.prev_hash.as_bytes();
                raw[byte] ^= mask;
                block.header.prev_hash = BlockHash::new(raw);
            }
            1 => {
                let mut raw = *block.header.tx_set_hash.as_bytes();
                raw[byte] ^= mask;
                block.header.tx_set_hash = votechain_types::TxSetHash::new(raw);
            }
            2 => {
                let mut raw = *block.header.hash.as_bytes();
                raw[byte] ^= mask;
                block.header.hash = BlockHash::new(raw);
            }
            _ => {
                let ts = block.header.timestamp.as_secs() ^ (1u64 << ((byte % 8) * 8 + bit as usize));
                block.header.timestamp = Timestamp::new(ts);
            }
        }
        prop_assert!(!block.hash_is_consistent());
    }
}
