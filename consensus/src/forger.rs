//! Block production by the forger chosen for a round.

use std::collections::HashSet;
use std::sync::Arc;

use votechain_crypto::SigningAdapter;
use votechain_ledger::validation::validate_transaction_in;
use votechain_ledger::{Block, Ledger, Validation};

use crate::stake::new_stake_transaction;
use crate::ConsensusError;

/// Result of answering one forge request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForgeOutcome {
    /// Local chain is shorter than the height the authority asked for.
    Behind { local: u64, requested: u64 },
    /// Spendable balance is too low to post a bond.
    CannotForge,
    /// No valid pending transaction to include.
    NothingToForge,
    /// Block appended locally; `height` is the new chain height.
    Forged { block: Block, height: u64 },
}

/// Builds and locally appends blocks for one wallet.
pub struct Forger {
    ledger: Arc<Ledger>,
    signer: Arc<dyn SigningAdapter>,
}

impl Forger {
    pub fn new(ledger: Arc<Ledger>, signer: Arc<dyn SigningAdapter>) -> Self {
        Self { ledger, signer }
    }

    /// Answer a forge request made at `requested_height`.
    ///
    /// The block is `[stake] ++ pending`, where pending transactions that
    /// fail validation or conflict with earlier picks are removed from the
    /// pool. Nothing is written unless a block is produced.
    pub fn forge(&self, requested_height: u64) -> Result<ForgeOutcome, ConsensusError> {
        let local = self.ledger.height()?;
        if local < requested_height {
            tracing::info!(local, requested = requested_height, "behind, not forging");
            return Ok(ForgeOutcome::Behind {
                local,
                requested: requested_height,
            });
        }

        let Some(stake) = new_stake_transaction(&self.ledger, self.signer.as_ref())? else {
            tracing::info!("balance too low to post a bond");
            return Ok(ForgeOutcome::CannotForge);
        };

        let limit = self.ledger.params().max_block_transactions.max(1) as usize;
        let mut spent: HashSet<_> = stake.spent_out_points().collect();
        let mut transactions = vec![stake];
        for tx in self.ledger.pending_transactions()? {
            if transactions.len() >= limit {
                break;
            }
            let mut trial = spent.clone();
            match validate_transaction_in(&tx, self.ledger.as_ref(), &mut trial)? {
                Validation::Valid => {
                    spent = trial;
                    transactions.push(tx);
                }
                Validation::Invalid(reason) => {
                    tracing::debug!(tx = %tx.id, %reason, "discarding pending transaction");
                    self.ledger.delete_pending(&tx.id)?;
                }
            }
        }
        if transactions.len() == 1 {
            tracing::info!("no pending transactions to forge");
            return Ok(ForgeOutcome::NothingToForge);
        }

        let block = Block::new(self.ledger.tip()?, transactions, self.ledger.params())?;
        self.ledger.append_block(&block)?;
        let height = local + 1;
        tracing::info!(hash = %block.hash(), height, transactions = block.body.count, "block forged");
        Ok(ForgeOutcome::Forged { block, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use votechain_crypto::Ed25519Signer;
    use votechain_ledger::{create_genesis_block, GenesisGrant, SpendPayload};
    use votechain_nullables::NullStore;
    use votechain_types::{AddressHash, ProtocolParams, Timestamp};

    struct Fixture {
        ledger: Arc<Ledger>,
        forger: Arc<Ed25519Signer>,
        voter: Ed25519Signer,
    }

    fn fixture(forger_balance: u64) -> Fixture {
        let authority = Ed25519Signer::from_seed(&[0xA0; 32]);
        let forger = Arc::new(Ed25519Signer::from_seed(&[1; 32]));
        let voter = Ed25519Signer::from_seed(&[2; 32]);
        let ledger = Arc::new(Ledger::new(
            Arc::new(NullStore::new()),
            authority.address(),
            ProtocolParams::default(),
        ));
        let genesis = create_genesis_block(
            &authority,
            &[
                GenesisGrant {
                    address: forger.address(),
                    value: forger_balance,
                },
                GenesisGrant {
                    address: voter.address(),
                    value: 10,
                },
            ],
            Timestamp::new(1),
            ledger.params(),
        )
        .unwrap();
        ledger.put_genesis(&genesis).unwrap();
        Fixture {
            ledger,
            forger,
            voter,
        }
    }

    fn cast(ledger: &Ledger, voter: &Ed25519Signer, party: AddressHash) {
        let utxo = ledger.spendable_utxos(&voter.address()).unwrap()[0];
        let payload = SpendPayload {
            sender: voter.address(),
            recipient: party,
            value: utxo.value,
        };
        let sig = voter.sign(&payload.to_bytes().unwrap());
        ledger
            .cast_vote(&voter.address(), &party, &sig, &voter.public_key())
            .unwrap();
    }

    #[test]
    fn forges_stake_plus_pending() {
        let f = fixture(20);
        cast(&f.ledger, &f.voter, AddressHash::new([0xEE; 32]));
        let forger = Forger::new(f.ledger.clone(), f.forger.clone());

        let ForgeOutcome::Forged { block, height } = forger.forge(1).unwrap() else {
            panic!("expected a block");
        };
        assert_eq!(height, 2);
        assert_eq!(block.body.count, 2);
        assert!(block.transactions()[0].is_stake_transaction(f.ledger.authority()));
        assert_eq!(f.ledger.tip().unwrap(), block.hash());
        assert!(f.ledger.pending_transactions().unwrap().is_empty());
        assert_eq!(f.ledger.balance(&f.forger.address()).unwrap(), 10);
        assert_eq!(f.ledger.balance(f.ledger.authority()).unwrap(), 10);
    }

    #[test]
    fn behind_forger_declines() {
        let f = fixture(20);
        let forger = Forger::new(f.ledger.clone(), f.forger.clone());
        assert_eq!(
            forger.forge(5).unwrap(),
            ForgeOutcome::Behind {
                local: 1,
                requested: 5
            }
        );
    }

    #[test]
    fn empty_pool_forges_nothing() {
        let f = fixture(20);
        let forger = Forger::new(f.ledger.clone(), f.forger.clone());
        assert_eq!(forger.forge(1).unwrap(), ForgeOutcome::NothingToForge);
        assert_eq!(f.ledger.height().unwrap(), 1);
        assert_eq!(f.ledger.balance(&f.forger.address()).unwrap(), 20);
    }

    #[test]
    fn poor_forger_cannot_forge() {
        let f = fixture(1);
        cast(&f.ledger, &f.voter, AddressHash::new([0xEE; 32]));
        let forger = Forger::new(f.ledger.clone(), f.forger.clone());
        assert_eq!(forger.forge(1).unwrap(), ForgeOutcome::CannotForge);
        assert_eq!(f.ledger.pending_transactions().unwrap().len(), 1);
    }

    #[test]
    fn invalid_pending_is_discarded() {
        let f = fixture(20);
        cast(&f.ledger, &f.voter, AddressHash::new([0xEE; 32]));
        let mut forged = f.ledger.pending_transactions().unwrap()[0].clone();
        forged.outputs[0].value = 5;
        forged.id = votechain_ledger::Transaction::compute_id(
            &forged.inputs,
            &forged.outputs,
            forged.timestamp,
        )
        .unwrap();
        // Same input as the honest ballot, different payout.
        f.ledger.put_pending(&forged).unwrap();

        let forger = Forger::new(f.ledger.clone(), f.forger.clone());
        let ForgeOutcome::Forged { block, .. } = forger.forge(1).unwrap() else {
            panic!("expected a block");
        };
        assert_eq!(block.body.count, 2);
        assert!(f.ledger.pending_transactions().unwrap().is_empty());
    }
}
