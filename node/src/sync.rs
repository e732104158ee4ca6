//! Startup catch-up from the authority.
//!
//! The node asks for the remote height, then for the hashes after its own
//! tip, then for each block in turn. Every block must hash consistently and
//! link to the previous one before it is stored.

use tokio::io::{AsyncRead, AsyncWrite};
use votechain_ledger::Ledger;
use votechain_network::PeerClient;

use crate::NodeError;

/// Pull missing blocks into `ledger`. Returns how many were stored.
pub async fn catch_up<S>(client: &mut PeerClient<S>, ledger: &Ledger) -> Result<u64, NodeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let remote = client.get_height().await?;
    let local = ledger.height()?;
    if local >= remote {
        tracing::debug!(local, remote, "chain is up to date");
        return Ok(0);
    }

    let mut tip = ledger.tip()?;
    let hashes = client.get_missing_blocks(&tip).await?;
    tracing::info!(local, remote, missing = hashes.len(), "catching up");

    let mut stored = 0;
    for hash in hashes {
        let block = client
            .get_block(&hash)
            .await?
            .ok_or_else(|| NodeError::Sync(format!("peer does not have block {}", hash.short())))?;
        if block.hash() != hash || !block.hash_is_consistent() {
            return Err(NodeError::Sync(format!(
                "block {} does not match its contents",
                hash.short()
            )));
        }
        if block.prev_hash() != tip {
            return Err(NodeError::Sync(format!(
                "block {} does not extend {}",
                hash.short(),
                tip.short()
            )));
        }
        tip = if tip.is_zero() {
            ledger.put_genesis(&block)?
        } else {
            ledger.append_block(&block)?
        };
        stored += 1;
    }
    tracing::info!(stored, height = local + stored, "caught up");
    Ok(stored)
}
