//! Ballot casting.
//!
//! A ballot spends one of the voter's outputs: `vote_value` goes to the
//! chosen party, the rest returns as change. The voter signs the spend
//! payload of the output being consumed, so the ledger picks the spendable
//! output the signature was made for.

use votechain_crypto::{hash_public_key, verify_signature};
use votechain_store::Utxo;
use votechain_types::{AddressHash, PublicKey, Signature};

use crate::ledger::Ledger;
use crate::transaction::{Input, Output, SpendPayload, Transaction};
use crate::LedgerError;

impl Ledger {
    /// Build the ballot transaction from `from` to `to` and put it in the
    /// pending pool.
    ///
    /// Fails with [`LedgerError::InsufficientBalance`] when `from` has no
    /// spendable output worth at least one vote, and with
    /// [`LedgerError::InvalidSignature`] when no such output matches the
    /// signature.
    pub fn cast_vote(
        &self,
        from: &AddressHash,
        to: &AddressHash,
        signature: &Signature,
        verifier: &PublicKey,
    ) -> Result<Transaction, LedgerError> {
        if hash_public_key(verifier) != *from {
            return Err(LedgerError::InvalidSignature);
        }
        if from == to {
            return Err(LedgerError::InvalidTransaction("cannot vote for yourself".into()));
        }
        let vote_value = self.params().vote_value;
        // concurrent ballots from one voter must not pick the same output
        let _pool = self.lock_pending();
        let candidates: Vec<Utxo> = self
            .spendable_utxos(from)?
            .into_iter()
            .filter(|u| u.value >= vote_value)
            .collect();
        if candidates.is_empty() {
            return Err(LedgerError::InsufficientBalance {
                address: *from,
                available: Utxo::total(&self.spendable_utxos(from)?),
            });
        }

        let mut chosen = None;
        for utxo in candidates {
            let payload = SpendPayload {
                sender: *from,
                recipient: *to,
                value: utxo.value,
            };
            if verify_signature(&payload.to_bytes()?, signature, verifier) {
                chosen = Some(utxo);
                break;
            }
        }
        let utxo = chosen.ok_or(LedgerError::InvalidSignature)?;

        let input = Input {
            previous: Some(utxo.out_point),
            sender: *from,
            signature: *signature,
            verifier: *verifier,
        };
        let mut outputs = vec![Output {
            value: vote_value,
            recipient: *to,
        }];
        if utxo.value > vote_value {
            outputs.push(Output {
                value: utxo.value - vote_value,
                recipient: *from,
            });
        }
        let tx = Transaction::new(vec![input], outputs)?;
        self.put_pending_locked(&tx)?;
        tracing::info!(tx = %tx.id, voter = %from.short(), party = %to.short(), "ballot queued");
        Ok(tx)
    }
}
