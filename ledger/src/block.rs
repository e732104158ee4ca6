//! Blocks: an ordered batch of transactions linked to its predecessor.

use serde::{Deserialize, Serialize};
use votechain_crypto::{canonical_json, sha256_multi};
use votechain_types::{BlockHash, ProtocolParams, Timestamp, TxSetHash};

use crate::transaction::Transaction;
use crate::LedgerError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub magic_number: u32,
    /// Encoded size of the body in bytes.
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    /// Predecessor, [`BlockHash::ZERO`] for genesis.
    pub prev_hash: BlockHash,
    pub tx_set_hash: TxSetHash,
    pub hash: BlockHash,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub transactions: Vec<Transaction>,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub metadata: Metadata,
    pub header: Header,
    pub body: Body,
}

/// SHA-256 of the concatenated transaction ids.
pub fn compute_tx_set_hash(transactions: &[Transaction]) -> TxSetHash {
    let ids: Vec<&[u8]> = transactions.iter().map(|t| t.id.as_bytes().as_slice()).collect();
    TxSetHash::new(sha256_multi(&ids))
}

/// SHA-256(prev_hash ‖ tx_set_hash ‖ big-endian timestamp).
pub fn compute_block_hash(
    prev_hash: &BlockHash,
    tx_set_hash: &TxSetHash,
    timestamp: Timestamp,
) -> BlockHash {
    BlockHash::new(sha256_multi(&[
        prev_hash.as_bytes().as_slice(),
        tx_set_hash.as_bytes().as_slice(),
        timestamp.to_be_bytes().as_slice(),
    ]))
}

impl Block {
    /// Assemble a block on top of `prev_hash`, stamped with the current time.
    pub fn new(
        prev_hash: BlockHash,
        transactions: Vec<Transaction>,
        params: &ProtocolParams,
    ) -> Result<Self, LedgerError> {
        Self::new_at(prev_hash, transactions, Timestamp::now(), params)
    }

    pub fn new_at(
        prev_hash: BlockHash,
        transactions: Vec<Transaction>,
        timestamp: Timestamp,
        params: &ProtocolParams,
    ) -> Result<Self, LedgerError> {
        let tx_set_hash = compute_tx_set_hash(&transactions);
        let hash = compute_block_hash(&prev_hash, &tx_set_hash, timestamp);
        let body = Body {
            count: transactions.len() as u64,
            transactions,
        };
        let size = canonical_json(&body)?.len() as u64;
        Ok(Self {
            metadata: Metadata {
                magic_number: params.magic_number,
                size,
            },
            header: Header {
                version: params.block_version,
                prev_hash,
                tx_set_hash,
                hash,
                timestamp,
            },
            body,
        })
    }

    pub fn hash(&self) -> BlockHash {
        self.header.hash
    }

    pub fn prev_hash(&self) -> BlockHash {
        self.header.prev_hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.body.transactions
    }

    /// First transaction, which must be the forger's stake.
    pub fn stake_transaction(&self) -> Option<&Transaction> {
        self.body.transactions.first()
    }

    /// Header hash matches the header fields, and the transaction set hash
    /// matches the body.
    pub fn hash_is_consistent(&self) -> bool {
        let header = &self.header;
        compute_tx_set_hash(&self.body.transactions) == header.tx_set_hash
            && compute_block_hash(&header.prev_hash, &header.tx_set_hash, header.timestamp)
                == header.hash
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
