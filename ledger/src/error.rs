use thiserror::Error;
use votechain_types::{AddressHash, BlockHash};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Store(#[from] votechain_store::StoreError),

    #[error("encoding error: {0}")]
    Crypto(#[from] votechain_crypto::CryptoError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    /// The block does not extend the current tip.
    #[error("block {block} does not extend tip {tip}")]
    NotOnTip { block: BlockHash, tip: BlockHash },

    /// A block consumed an output that is no longer unspent.
    #[error("double spend: {0}")]
    DoubleSpend(String),

    #[error("block {0} referenced by the chain is missing")]
    MissingBlock(BlockHash),

    #[error("insufficient balance for {address}: {available} available")]
    InsufficientBalance { address: AddressHash, available: u64 },

    #[error("signature does not match any spendable output")]
    InvalidSignature,
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

impl LedgerError {
    /// Whether this error comes from the storage layer rather than the data.
    pub fn is_storage(&self) -> bool {
        matches!(self, LedgerError::Store(_) | LedgerError::MissingBlock(_))
    }
}
