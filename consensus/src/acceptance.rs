//! Deciding what to do with a block broadcast by a forger.
//!
//! A block that does not fit the local chain is stale and ignored. A block
//! that fits but breaks a rule gets its forger punished: the stake is kept in
//! the pending pool so the bond still reaches the authority, and the
//! connection is dropped. An accepted block is appended; the authority then
//! issues the return-stake transaction that refunds the bond.

use std::sync::Arc;

use votechain_crypto::SigningAdapter;
use votechain_ledger::{Block, Ledger, LedgerError, Transaction, Validation};
use votechain_types::{AddressHash, BlockHash};

use crate::stake::new_return_stake_transaction;
use crate::ConsensusError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockVerdict {
    /// Appended to the local chain. `return_stake` is set when this node is
    /// the stakeholder and refunded the bond.
    Accepted {
        hash: BlockHash,
        return_stake: Option<Transaction>,
    },
    /// Does not extend the local tip; not the forger's fault.
    Stale { reason: String },
    /// Invalid block. `stake` is the forger's bond, now in the pending pool.
    Punished {
        stake: Option<Transaction>,
        reason: String,
    },
}

pub struct BlockAcceptor {
    ledger: Arc<Ledger>,
    signer: Arc<dyn SigningAdapter>,
}

impl BlockAcceptor {
    pub fn new(ledger: Arc<Ledger>, signer: Arc<dyn SigningAdapter>) -> Self {
        Self { ledger, signer }
    }

    /// Judge `block`, forged by `sender` at `claimed_height`.
    ///
    /// `Err` means the block could not be judged (storage failure) and must
    /// not be held against the sender.
    pub fn accept(
        &self,
        block: &Block,
        claimed_height: u64,
        sender: &AddressHash,
    ) -> Result<BlockVerdict, ConsensusError> {
        let local = self.ledger.height()?;
        if local + 1 < claimed_height {
            return Ok(self.stale(format!(
                "local height {local} is too low for block at height {claimed_height}"
            )));
        }
        if self.ledger.get_block(&block.hash())?.is_some() {
            return Ok(self.stale(format!("block {} is already known", block.hash())));
        }
        let tip = self.ledger.tip()?;
        if block.prev_hash() != tip {
            return Ok(self.stale(format!(
                "block {} builds on {} instead of tip {tip}",
                block.hash(),
                block.prev_hash()
            )));
        }

        if let Validation::Invalid(reason) = self.ledger.validate_block(block, sender)? {
            return self.punish(block, reason);
        }
        match self.ledger.append_block(block) {
            Ok(_) => {}
            Err(LedgerError::DoubleSpend(reason)) => return self.punish(block, reason),
            Err(LedgerError::NotOnTip { tip, .. }) => {
                return Ok(self.stale(format!("tip moved to {tip} while validating")));
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(hash = %block.hash(), forger = %sender.short(), "block accepted");

        let return_stake = if self.signer.address() == *self.ledger.authority() {
            match block.stake_transaction() {
                Some(stake) => {
                    let refund = new_return_stake_transaction(stake, self.signer.as_ref())?;
                    self.ledger.put_pending(&refund)?;
                    tracing::info!(tx = %refund.id, forger = %sender.short(), "stake returned");
                    Some(refund)
                }
                None => None,
            }
        } else {
            None
        };
        Ok(BlockVerdict::Accepted {
            hash: block.hash(),
            return_stake,
        })
    }

    fn stale(&self, reason: String) -> BlockVerdict {
        tracing::warn!(%reason, "stale block");
        BlockVerdict::Stale { reason }
    }

    /// Keep the forger's bond as a pending transaction.
    fn punish(&self, block: &Block, reason: String) -> Result<BlockVerdict, ConsensusError> {
        tracing::warn!(hash = %block.hash(), %reason, "punishing forger");
        let stake = match block.stake_transaction() {
            Some(stake)
                if stake.is_stake_transaction(self.ledger.authority()) && stake.id_matches()? =>
            {
                self.ledger.put_pending(stake)?;
                Some(stake.clone())
            }
            _ => None,
        };
        Ok(BlockVerdict::Punished { stake, reason })
    }
}
