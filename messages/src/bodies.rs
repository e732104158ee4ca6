//! Message bodies, one struct per payload shape.

use serde::{Deserialize, Serialize};
use votechain_ledger::{Block, Transaction};
use votechain_types::BlockHash;

/// Reply to `get-height`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightBody {
    pub height: u64,
}

/// `get-block` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlockBody {
    pub hash: BlockHash,
}

/// Reply to `get-block`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBody {
    pub block: Block,
}

/// `get-missing-blocks` request: the caller's tip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMissingBlocksBody {
    pub last_block: BlockHash,
}

/// Reply to `get-missing-blocks`, oldest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingBlocksBody {
    pub blocks: Vec<BlockHash>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBody {
    pub node_id: String,
}

/// Reply to `register`: peers registered before the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeersBody {
    pub peers: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeBlockBody {
    pub height: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockForgedBody {
    /// Chain height including this block.
    pub height: u64,
    pub block: Block,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub transaction: Transaction,
}
