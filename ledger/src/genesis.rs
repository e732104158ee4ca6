//! Genesis block creation: the first block of a network.
//!
//! The genesis block holds one base transaction per grant, each signed by
//! the authority. It has `prev_hash: BlockHash::ZERO` and is the only block
//! allowed to contain base transactions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use votechain_crypto::{hash_public_key, verify_signature, SigningAdapter};
use votechain_types::{AddressHash, BlockHash, ProtocolParams, Timestamp};

use crate::block::Block;
use crate::transaction::{SpendPayload, Transaction};
use crate::validation::Validation;
use crate::LedgerError;

/// Initial allocation of vote tokens to one address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisGrant {
    pub address: AddressHash,
    pub value: u64,
}

/// Build the genesis block granting `grants`, signed by `authority`.
pub fn create_genesis_block(
    authority: &dyn SigningAdapter,
    grants: &[GenesisGrant],
    timestamp: Timestamp,
    params: &ProtocolParams,
) -> Result<Block, LedgerError> {
    if grants.is_empty() {
        return Err(LedgerError::InvalidGenesis("no grants".into()));
    }
    let mut seen = HashSet::new();
    let mut transactions = Vec::with_capacity(grants.len());
    for grant in grants {
        if !seen.insert(grant.address) {
            return Err(LedgerError::InvalidGenesis(format!(
                "address {} granted twice",
                grant.address
            )));
        }
        if grant.value == 0 {
            return Err(LedgerError::InvalidGenesis(format!(
                "zero grant to {}",
                grant.address
            )));
        }
        transactions.push(Transaction::new_base(
            authority,
            grant.address,
            grant.value,
            timestamp,
        )?);
    }
    Block::new_at(BlockHash::ZERO, transactions, timestamp, params)
}

/// A genesis block is well formed when it starts the chain, its hash is
/// consistent, and every transaction is a base grant signed by `authority`.
pub fn verify_genesis(block: &Block, authority: &AddressHash) -> Result<Validation, LedgerError> {
    if !block.prev_hash().is_zero() {
        return Ok(Validation::Invalid("genesis must not have a predecessor".into()));
    }
    if block.transactions().is_empty() || !block.hash_is_consistent() {
        return Ok(Validation::Invalid("genesis hash or body is inconsistent".into()));
    }
    for tx in block.transactions() {
        if !tx.is_base() || !tx.id_matches()? {
            return Ok(Validation::Invalid(format!("{} is not a base grant", tx.id)));
        }
        let input = &tx.inputs[0];
        let output = &tx.outputs[0];
        if input.sender != *authority || hash_public_key(&input.verifier) != *authority {
            return Ok(Validation::Invalid(format!(
                "grant {} is not issued by the authority",
                tx.id
            )));
        }
        let payload = SpendPayload {
            sender: input.sender,
            recipient: output.recipient,
            value: output.value,
        };
        if !verify_signature(&payload.to_bytes()?, &input.signature, &input.verifier) {
            return Ok(Validation::Invalid(format!("grant {} has a bad signature", tx.id)));
        }
    }
    Ok(Validation::Valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use votechain_crypto::Ed25519Signer;

    fn grants() -> Vec<GenesisGrant> {
        vec![
            GenesisGrant {
                address: AddressHash::new([1; 32]),
                value: 100,
            },
            GenesisGrant {
                address: AddressHash::new([2; 32]),
                value: 20,
            },
        ]
    }

    #[test]
    fn genesis_verifies_under_its_authority() {
        let authority = Ed25519Signer::from_seed(&[9; 32]);
        let block = create_genesis_block(
            &authority,
            &grants(),
            Timestamp::new(1),
            &ProtocolParams::default(),
        )
        .unwrap();
        assert_eq!(block.body.count, 2);
        assert!(verify_genesis(&block, &authority.address()).unwrap().is_valid());

        let other = Ed25519Signer::from_seed(&[8; 32]);
        assert!(!verify_genesis(&block, &other.address()).unwrap().is_valid());
    }

    #[test]
    fn duplicate_grants_are_refused() {
        let authority = Ed25519Signer::from_seed(&[9; 32]);
        let mut twice = grants();
        twice.push(twice[0]);
        let err = create_genesis_block(
            &authority,
            &twice,
            Timestamp::new(1),
            &ProtocolParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidGenesis(_)));
    }

    #[test]
    fn tampered_grant_is_invalid() {
        let authority = Ed25519Signer::from_seed(&[9; 32]);
        let mut block = create_genesis_block(
            &authority,
            &grants(),
            Timestamp::new(1),
            &ProtocolParams::default(),
        )
        .unwrap();
        block.body.transactions[0].outputs[0].value = 1_000_000;
        assert!(!verify_genesis(&block, &authority.address()).unwrap().is_valid());
    }
}
