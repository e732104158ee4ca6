use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] votechain_ledger::LedgerError),

    #[error("consensus error: {0}")]
    Consensus(#[from] votechain_consensus::ConsensusError),

    #[error("network error: {0}")]
    Network(#[from] votechain_network::NetworkError),

    #[error("store error: {0}")]
    Store(#[from] votechain_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] votechain_store_lmdb::LmdbError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    /// The peer we synchronise from served something unusable.
    #[error("sync failed: {0}")]
    Sync(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RPC server error: {0}")]
    Rpc(String),
}

impl NodeError {
    /// Whether the local store failed, as opposed to a peer or the config.
    pub fn is_storage(&self) -> bool {
        match self {
            NodeError::Ledger(e) => e.is_storage(),
            NodeError::Consensus(e) => e.is_storage(),
            NodeError::Store(_) | NodeError::Lmdb(_) => true,
            _ => false,
        }
    }
}
