//! Stake and return-stake transactions.
//!
//! A forger bonds half of its spendable balance to the authority before it
//! may produce a block. Once the block is accepted the authority pays the
//! bond back with a return-stake transaction.

use votechain_crypto::SigningAdapter;
use votechain_ledger::{Ledger, Output, SpendPayload, Transaction};
use votechain_store::Utxo;
use votechain_types::OutPoint;

use crate::ConsensusError;

/// Bond `floor(spendable / 2)` from `signer` to the ledger's authority.
///
/// Returns `Ok(None)` when the bond would be below `min_bond`; that is a
/// normal outcome at low balance. Outputs are taken greedily in store order
/// until they cover the bond, and every input signs
/// `{sender: self, recipient: authority, value: utxo.value}`.
pub fn new_stake_transaction(
    ledger: &Ledger,
    signer: &dyn SigningAdapter,
) -> Result<Option<Transaction>, ConsensusError> {
    let owner = signer.address();
    let authority = *ledger.authority();
    let spendable = ledger.spendable_utxos(&owner)?;
    let target = Utxo::total(&spendable) / 2;
    if target == 0 || target < ledger.params().min_bond {
        tracing::debug!(owner = %owner.short(), target, "bond below minimum");
        return Ok(None);
    }

    let mut accumulated = 0u64;
    let mut inputs = Vec::new();
    for utxo in &spendable {
        let payload = SpendPayload {
            sender: owner,
            recipient: authority,
            value: utxo.value,
        };
        inputs.push(payload.sign_input(Some(utxo.out_point), signer)?);
        accumulated += utxo.value;
        if accumulated >= target {
            break;
        }
    }

    let mut outputs = vec![Output {
        value: target,
        recipient: authority,
    }];
    if accumulated > target {
        outputs.push(Output {
            value: accumulated - target,
            recipient: owner,
        });
    }
    Ok(Some(Transaction::new(inputs, outputs)?))
}

/// Pay the bond of `stake` back to its owner, signed by the stakeholder.
///
/// The input spends the stake output that pays `stakeholder`; the single
/// output returns the same value to the sender of the stake's first input.
pub fn new_return_stake_transaction(
    stake: &Transaction,
    stakeholder: &dyn SigningAdapter,
) -> Result<Transaction, ConsensusError> {
    let holder = stakeholder.address();
    let not_stakeholder = || ConsensusError::NotStakeholder {
        stake: stake.id,
        stakeholder: holder,
    };
    let (index, bond) = stake
        .outputs
        .iter()
        .enumerate()
        .find(|(_, o)| o.recipient == holder)
        .ok_or_else(not_stakeholder)?;
    let owner = stake.stake_owner().ok_or_else(not_stakeholder)?;

    let payload = SpendPayload {
        sender: holder,
        recipient: owner,
        value: bond.value,
    };
    let input = payload.sign_input(Some(OutPoint::new(stake.id, index as u32)), stakeholder)?;
    Ok(Transaction::new(
        vec![input],
        vec![Output {
            value: bond.value,
            recipient: owner,
        }],
    )?)
}
