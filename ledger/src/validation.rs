//! Transaction and block validation rules.
//!
//! Validation outcomes are values: a rejected transaction or block is a
//! normal result ([`Validation::Invalid`]), while an `Err` always means the
//! rules could not be evaluated (storage failure, encoding failure).

use std::collections::HashSet;

use votechain_crypto::{hash_public_key, verify_signature};
use votechain_store::Utxo;
use votechain_types::{AddressHash, OutPoint, ProtocolParams};

use crate::block::Block;
use crate::transaction::{SpendPayload, Transaction};
use crate::LedgerError;

/// Outcome of a validation check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(String),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    /// Reason for rejection, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Validation::Valid => None,
            Validation::Invalid(reason) => Some(reason),
        }
    }
}

macro_rules! reject {
    ($($arg:tt)*) => {
        return Ok(Validation::Invalid(format!($($arg)*)))
    };
}

/// Read access to the unspent-output set.
pub trait UtxoView {
    fn utxo(&self, out_point: &OutPoint) -> Result<Option<Utxo>, LedgerError>;
}

/// Validate a non-base transaction against `view`.
///
/// `spent` collects every outpoint consumed so far in the enclosing block; an
/// outpoint already present is a double spend.
pub fn validate_transaction_in(
    tx: &Transaction,
    view: &dyn UtxoView,
    spent: &mut HashSet<OutPoint>,
) -> Result<Validation, LedgerError> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        reject!("transaction {} has no inputs or no outputs", tx.id);
    }
    if tx.is_base() {
        reject!("base transaction {} outside genesis", tx.id);
    }
    if !tx.id_matches()? {
        reject!("transaction id {} does not match its content", tx.id);
    }
    if tx.outputs.iter().any(|o| o.value == 0) {
        reject!("transaction {} has a zero-value output", tx.id);
    }
    let Some(output_total) = tx.output_total() else {
        reject!("transaction {} output total overflows", tx.id);
    };

    let mut input_total: u64 = 0;
    for input in &tx.inputs {
        let Some(out_point) = input.previous else {
            reject!("transaction {} has an input without a previous output", tx.id);
        };
        if !spent.insert(out_point) {
            reject!("output {out_point} is spent twice");
        }
        if hash_public_key(&input.verifier) != input.sender {
            reject!("verifier of input {out_point} does not hash to its sender");
        }
        let Some(utxo) = view.utxo(&out_point)? else {
            reject!("output {out_point} is unknown or already spent");
        };
        if utxo.address != input.sender {
            reject!("output {out_point} is not owned by {}", input.sender);
        }
        let Some(recipient) = tx.recipient_for(input) else {
            reject!("transaction {} has no recipient for input {out_point}", tx.id);
        };
        let payload = SpendPayload {
            sender: input.sender,
            recipient: recipient.recipient,
            value: utxo.value,
        };
        if !verify_signature(&payload.to_bytes()?, &input.signature, &input.verifier) {
            reject!("bad signature on input {out_point}");
        }
        input_total = match input_total.checked_add(utxo.value) {
            Some(total) => total,
            None => reject!("transaction {} input total overflows", tx.id),
        };
    }

    if input_total != output_total {
        reject!(
            "transaction {} moves {input_total} in but {output_total} out",
            tx.id
        );
    }
    Ok(Validation::Valid)
}

/// Validate a forged block received from `claimed_sender`.
///
/// Checks the header hash, the magic number, the body count, the stake
/// transaction in first position, and every transaction against `view` with
/// double spends tracked across the whole block.
pub fn validate_block_with(
    block: &Block,
    claimed_sender: &AddressHash,
    authority: &AddressHash,
    params: &ProtocolParams,
    view: &dyn UtxoView,
) -> Result<Validation, LedgerError> {
    let Some(stake) = block.stake_transaction() else {
        reject!("block {} has no transactions", block.hash());
    };
    if block.metadata.magic_number != params.magic_number {
        reject!("block {} has magic number {:#x}", block.hash(), block.metadata.magic_number);
    }
    if block.body.count != block.body.transactions.len() as u64 {
        reject!("block {} count does not match its body", block.hash());
    }
    if !block.hash_is_consistent() {
        reject!("block {} hash does not match its contents", block.hash());
    }
    if !stake.is_stake_transaction(authority) {
        reject!("first transaction of block {} is not a stake", block.hash());
    }
    if stake.stake_owner().as_ref() != Some(claimed_sender) {
        reject!("stake of block {} is not owned by its sender", block.hash());
    }

    let mut spent = HashSet::new();
    for tx in block.transactions() {
        if let Validation::Invalid(reason) = validate_transaction_in(tx, view, &mut spent)? {
            return Ok(Validation::Invalid(reason));
        }
    }
    Ok(Validation::Valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Output;
    use std::collections::HashMap;
    use votechain_crypto::{Ed25519Signer, SigningAdapter};
    use votechain_types::{Timestamp, TxId};

    #[derive(Default)]
    struct MapView(HashMap<OutPoint, Utxo>);

    impl MapView {
        fn with(mut self, utxo: Utxo) -> Self {
            self.0.insert(utxo.out_point, utxo);
            self
        }
    }

    impl UtxoView for MapView {
        fn utxo(&self, out_point: &OutPoint) -> Result<Option<Utxo>, LedgerError> {
            Ok(self.0.get(out_point).copied())
        }
    }

    fn owned(signer: &Ed25519Signer, tag: u8, value: u64) -> Utxo {
        Utxo {
            out_point: OutPoint::new(TxId::new([tag; 32]), 0),
            address: signer.address(),
            value,
        }
    }

    fn spend(
        signer: &Ed25519Signer,
        utxo: &Utxo,
        to: AddressHash,
        amount: u64,
    ) -> Transaction {
        let input = SpendPayload {
            sender: signer.address(),
            recipient: to,
            value: utxo.value,
        }
        .sign_input(Some(utxo.out_point), signer)
        .unwrap();
        let mut outputs = vec![Output {
            value: amount,
            recipient: to,
        }];
        if utxo.value > amount {
            outputs.push(Output {
                value: utxo.value - amount,
                recipient: signer.address(),
            });
        }
        Transaction::new_at(vec![input], outputs, Timestamp::new(5)).unwrap()
    }

    fn check(tx: &Transaction, view: &MapView) -> Validation {
        validate_transaction_in(tx, view, &mut HashSet::new()).unwrap()
    }

    #[test]
    fn valid_spend() {
        let alice = Ed25519Signer::from_seed(&[1; 32]);
        let utxo = owned(&alice, 1, 100);
        let view = MapView::default().with(utxo);
        let tx = spend(&alice, &utxo, AddressHash::new([9; 32]), 1);
        assert_eq!(check(&tx, &view), Validation::Valid);
    }

    #[test]
    fn missing_output_is_rejected() {
        let alice = Ed25519Signer::from_seed(&[1; 32]);
        let utxo = owned(&alice, 1, 100);
        let tx = spend(&alice, &utxo, AddressHash::new([9; 32]), 1);
        assert!(!check(&tx, &MapView::default()).is_valid());
    }

    #[test]
    fn foreign_output_is_rejected() {
        let alice = Ed25519Signer::from_seed(&[1; 32]);
        let bob = Ed25519Signer::from_seed(&[2; 32]);
        let bobs = owned(&bob, 1, 100);
        let view = MapView::default().with(bobs);
        // Alice signs a spend of Bob's output with her own key.
        let tx = spend(&alice, &bobs, AddressHash::new([9; 32]), 1);
        assert!(!check(&tx, &view).is_valid());
    }

    #[test]
    fn inflated_output_is_rejected() {
        let alice = Ed25519Signer::from_seed(&[1; 32]);
        let utxo = owned(&alice, 1, 100);
        let view = MapView::default().with(utxo);
        let mut tx = spend(&alice, &utxo, AddressHash::new([9; 32]), 1);
        tx.outputs[1].value = 150;
        tx.id = Transaction::compute_id(&tx.inputs, &tx.outputs, tx.timestamp).unwrap();
        let result = check(&tx, &view);
        assert!(result.reason().unwrap().contains("moves 100 in"));
    }

    #[test]
    fn signature_over_wrong_value_is_rejected() {
        let alice = Ed25519Signer::from_seed(&[1; 32]);
        let utxo = owned(&alice, 1, 100);
        let view = MapView::default().with(utxo);
        let to = AddressHash::new([9; 32]);
        let input = SpendPayload {
            sender: alice.address(),
            recipient: to,
            value: 1,
        }
        .sign_input(Some(utxo.out_point), &alice)
        .unwrap();
        let tx = Transaction::new_at(
            vec![input],
            vec![
                Output {
                    value: 1,
                    recipient: to,
                },
                Output {
                    value: 99,
                    recipient: alice.address(),
                },
            ],
            Timestamp::new(5),
        )
        .unwrap();
        assert!(check(&tx, &view).reason().unwrap().contains("bad signature"));
    }

    #[test]
    fn second_spend_in_same_set_is_rejected() {
        let alice = Ed25519Signer::from_seed(&[1; 32]);
        let utxo = owned(&alice, 1, 100);
        let view = MapView::default().with(utxo);
        let first = spend(&alice, &utxo, AddressHash::new([9; 32]), 1);
        let second = spend(&alice, &utxo, AddressHash::new([8; 32]), 2);

        let mut spent = HashSet::new();
        assert!(validate_transaction_in(&first, &view, &mut spent)
            .unwrap()
            .is_valid());
        let again = validate_transaction_in(&second, &view, &mut spent).unwrap();
        assert!(again.reason().unwrap().contains("spent twice"));
    }

    #[test]
    fn base_transactions_are_rejected_outside_genesis() {
        let authority = Ed25519Signer::from_seed(&[7; 32]);
        let base = Transaction::new_base(
            &authority,
            AddressHash::new([3; 32]),
            10,
            Timestamp::new(1),
        )
        .unwrap();
        assert!(!check(&base, &MapView::default()).is_valid());
    }
}
