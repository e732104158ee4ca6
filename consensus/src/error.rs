use thiserror::Error;
use votechain_ledger::LedgerError;
use votechain_types::{AddressHash, TxId};

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The return-stake signer is not the stakeholder of the bond.
    #[error("stake {stake} pays nothing to {stakeholder}")]
    NotStakeholder { stake: TxId, stakeholder: AddressHash },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ConsensusError {
    /// Whether the ledger storage failed, as opposed to a protocol problem.
    pub fn is_storage(&self) -> bool {
        matches!(self, ConsensusError::Ledger(e) if e.is_storage())
    }
}
