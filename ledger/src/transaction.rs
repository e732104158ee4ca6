//! Transactions: inputs consuming earlier outputs, outputs paying address hashes.

use serde::{Deserialize, Serialize};
use votechain_crypto::{canonical_json, sha256, SigningAdapter};
use votechain_store::Utxo;
use votechain_types::{AddressHash, OutPoint, PublicKey, Signature, Timestamp, TxId};

use crate::LedgerError;

/// Spends one earlier output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Output being consumed; `None` only in a base transaction.
    pub previous: Option<OutPoint>,
    /// Address hash of the spender.
    pub sender: AddressHash,
    /// Signature over the [`SpendPayload`] of this input.
    pub signature: Signature,
    /// The spender's public key.
    pub verifier: PublicKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub value: u64,
    pub recipient: AddressHash,
}

/// The exact fields an input signature covers.
///
/// `value` is the value of the output being spent, not of the new output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SpendPayload {
    pub sender: AddressHash,
    pub recipient: AddressHash,
    pub value: u64,
}

impl SpendPayload {
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(canonical_json(self)?)
    }

    /// Sign this payload and wrap the result into an input spending `previous`.
    pub fn sign_input(
        &self,
        previous: Option<OutPoint>,
        signer: &dyn SigningAdapter,
    ) -> Result<Input, LedgerError> {
        Ok(Input {
            previous,
            sender: self.sender,
            signature: signer.sign(&self.to_bytes()?),
            verifier: signer.public_key(),
        })
    }
}

/// An immutable transfer of value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub timestamp: Timestamp,
}

#[derive(Serialize)]
struct IdContent<'a> {
    inputs: &'a [Input],
    outputs: &'a [Output],
    timestamp: Timestamp,
}

impl Transaction {
    /// Build a transaction stamped with the current time. Balances are not checked.
    pub fn new(inputs: Vec<Input>, outputs: Vec<Output>) -> Result<Self, LedgerError> {
        Self::new_at(inputs, outputs, Timestamp::now())
    }

    pub fn new_at(
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        timestamp: Timestamp,
    ) -> Result<Self, LedgerError> {
        let id = Self::compute_id(&inputs, &outputs, timestamp)?;
        Ok(Self {
            id,
            inputs,
            outputs,
            timestamp,
        })
    }

    pub fn compute_id(
        inputs: &[Input],
        outputs: &[Output],
        timestamp: Timestamp,
    ) -> Result<TxId, LedgerError> {
        let content = IdContent {
            inputs,
            outputs,
            timestamp,
        };
        Ok(TxId::new(sha256(&canonical_json(&content)?)))
    }

    /// Whether `id` matches the content.
    pub fn id_matches(&self) -> Result<bool, LedgerError> {
        Ok(Self::compute_id(&self.inputs, &self.outputs, self.timestamp)? == self.id)
    }

    /// One provenance-free input paying exactly one output.
    pub fn is_base(&self) -> bool {
        self.inputs.len() == 1 && self.outputs.len() == 1 && self.inputs[0].previous.is_none()
    }

    /// A bond to `authority`: real inputs from one sender, first output to the
    /// authority, and at most one change output back to that sender.
    pub fn is_stake_transaction(&self, authority: &AddressHash) -> bool {
        let Some(owner) = self.stake_owner() else {
            return false;
        };
        if owner == *authority
            || self.inputs.iter().any(|i| i.previous.is_none() || i.sender != owner)
        {
            return false;
        }
        match self.outputs.as_slice() {
            [bond] => bond.recipient == *authority,
            [bond, change] => bond.recipient == *authority && change.recipient == owner,
            _ => false,
        }
    }

    /// Sender of the first input: the forger, for a stake transaction.
    pub fn stake_owner(&self) -> Option<AddressHash> {
        self.inputs.first().map(|i| i.sender)
    }

    /// Output the signature of `input` names as recipient: the first output
    /// not paying the input's own sender.
    pub fn recipient_for(&self, input: &Input) -> Option<&Output> {
        self.outputs.iter().find(|o| o.recipient != input.sender)
    }

    /// Outputs this transaction consumes.
    pub fn spent_out_points(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.inputs.iter().filter_map(|i| i.previous)
    }

    /// Unspent outputs this transaction creates once accepted.
    pub fn created_utxos(&self) -> Vec<Utxo> {
        self.outputs
            .iter()
            .enumerate()
            .map(|(index, output)| Utxo {
                out_point: OutPoint::new(self.id, index as u32),
                address: output.recipient,
                value: output.value,
            })
            .collect()
    }

    /// Sum of output values, `None` on overflow.
    pub fn output_total(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }

    /// Genesis-style grant of `value` to `recipient`, signed by `creator`.
    pub fn new_base(
        creator: &dyn SigningAdapter,
        recipient: AddressHash,
        value: u64,
        timestamp: Timestamp,
    ) -> Result<Self, LedgerError> {
        let payload = SpendPayload {
            sender: creator.address(),
            recipient,
            value,
        };
        let input = payload.sign_input(None, creator)?;
        Self::new_at(vec![input], vec![Output { value, recipient }], timestamp)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use votechain_crypto::Ed25519Signer;

    fn signer(seed: u8) -> Ed25519Signer {
        Ed25519Signer::from_seed(&[seed; 32])
    }

    fn spend_input(from: &Ed25519Signer, to: AddressHash, value: u64) -> Input {
        SpendPayload {
            sender: from.address(),
            recipient: to,
            value,
        }
        .sign_input(Some(OutPoint::new(TxId::new([1; 32]), 0)), from)
        .unwrap()
    }

    #[test]
    fn id_covers_timestamp() {
        let a = signer(1);
        let input = spend_input(&a, AddressHash::new([2; 32]), 5);
        let out = vec![Output {
            value: 5,
            recipient: AddressHash::new([2; 32]),
        }];
        let t1 = Transaction::new_at(vec![input.clone()], out.clone(), Timestamp::new(1)).unwrap();
        let t2 = Transaction::new_at(vec![input], out, Timestamp::new(2)).unwrap();
        assert_ne!(t1.id, t2.id);
        assert!(t1.id_matches().unwrap());
    }

    #[test]
    fn tampered_output_breaks_id() {
        let authority = signer(9);
        let mut tx =
            Transaction::new_base(&authority, AddressHash::new([3; 32]), 100, Timestamp::new(7))
                .unwrap();
        assert!(tx.is_base());
        tx.outputs[0].value = 1000;
        assert!(!tx.id_matches().unwrap());
    }

    #[test]
    fn stake_shape() {
        let forger = signer(1);
        let authority = AddressHash::new([0xAA; 32]);
        let bond = Output {
            value: 10,
            recipient: authority,
        };
        let change = Output {
            value: 3,
            recipient: forger.address(),
        };
        let input = spend_input(&forger, authority, 13);

        let stake =
            Transaction::new_at(vec![input.clone()], vec![bond, change], Timestamp::new(1))
                .unwrap();
        assert!(stake.is_stake_transaction(&authority));
        assert_eq!(stake.stake_owner(), Some(forger.address()));

        let wrong_change = Output {
            value: 3,
            recipient: AddressHash::new([5; 32]),
        };
        let not_stake =
            Transaction::new_at(vec![input.clone()], vec![bond, wrong_change], Timestamp::new(1))
                .unwrap();
        assert!(!not_stake.is_stake_transaction(&authority));

        let vote = Transaction::new_at(vec![input], vec![change, bond], Timestamp::new(1)).unwrap();
        assert!(!vote.is_stake_transaction(&authority));
    }

    #[test]
    fn base_transaction_is_never_stake() {
        let authority = signer(9);
        let base =
            Transaction::new_base(&authority, AddressHash::new([3; 32]), 100, Timestamp::new(7))
                .unwrap();
        assert!(!base.is_stake_transaction(&AddressHash::new([3; 32])));
    }

    #[test]
    fn created_utxos_are_indexed_by_position() {
        let authority = signer(9);
        let base =
            Transaction::new_base(&authority, AddressHash::new([3; 32]), 100, Timestamp::new(7))
                .unwrap();
        let utxos = base.created_utxos();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].out_point, OutPoint::new(base.id, 0));
        assert_eq!(utxos[0].value, 100);
    }

    #[test]
    fn bincode_roundtrip() {
        let authority = signer(9);
        let base =
            Transaction::new_base(&authority, AddressHash::new([3; 32]), 100, Timestamp::new(7))
                .unwrap();
        let decoded = Transaction::from_bytes(&base.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, base);
    }
}
