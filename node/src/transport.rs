//! Forging-round transport over the peer hub.

use std::sync::Arc;

use votechain_consensus::{ConsensusError, RoundTransport};
use votechain_messages::{ForgeBlockBody, MessageType, Pong};
use votechain_network::Hub;

use crate::metrics::NodeMetrics;

/// Asks one random registered peer to forge.
pub struct HubTransport {
    hub: Arc<Hub>,
    metrics: Arc<NodeMetrics>,
}

impl HubTransport {
    pub fn new(hub: Arc<Hub>, metrics: Arc<NodeMetrics>) -> Self {
        Self { hub, metrics }
    }
}

impl RoundTransport for HubTransport {
    fn peer_count(&self) -> usize {
        let peers = self.hub.registered_count();
        self.metrics.peer_count.set(peers as i64);
        peers
    }

    fn solicit(&self, height: u64) -> Result<(), ConsensusError> {
        let request = Pong::push(MessageType::ForgeBlock, &ForgeBlockBody { height })
            .map_err(|e| ConsensusError::Transport(e.to_string()))?;
        let chosen = self
            .hub
            .random_unicast(&request)
            .map_err(|e| ConsensusError::Transport(e.to_string()))?;
        self.metrics.rounds_solicited.inc();
        tracing::debug!(connection = %chosen, height, "forge request queued");
        Ok(())
    }
}
