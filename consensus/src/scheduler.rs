//! Forging rounds, driven by the authority.
//!
//! On every tick the authority checks it has enough registered peers, reads
//! its chain height and asks one random peer to forge on top of it. Rounds
//! never overlap: a tick that fires while a round is still running is
//! skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use votechain_ledger::Ledger;

use crate::ConsensusError;

/// How the scheduler reaches peers.
pub trait RoundTransport: Send + Sync {
    /// Registered peers right now.
    fn peer_count(&self) -> usize;

    /// Send a forge request for `height` to one random peer. Fire and forget.
    fn solicit(&self, height: u64) -> Result<(), ConsensusError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    InsufficientPeers { peers: usize },
    Solicited { height: u64 },
    /// The previous round was still running.
    Skipped,
    Failed(String),
}

pub struct ForgerScheduler {
    ledger: Arc<Ledger>,
    transport: Arc<dyn RoundTransport>,
    min_peers: usize,
    busy: AtomicBool,
}

/// Clears the busy flag when a round ends, however it ends.
struct RoundGuard<'a>(&'a AtomicBool);

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ForgerScheduler {
    pub fn new(ledger: Arc<Ledger>, transport: Arc<dyn RoundTransport>, min_peers: usize) -> Self {
        Self {
            ledger,
            transport,
            min_peers,
            busy: AtomicBool::new(false),
        }
    }

    /// Run one round now.
    pub fn run_round(&self) -> RoundOutcome {
        if self.busy.swap(true, Ordering::AcqRel) {
            tracing::debug!("previous forging round still running");
            return RoundOutcome::Skipped;
        }
        let _guard = RoundGuard(&self.busy);

        let peers = self.transport.peer_count();
        if peers < self.min_peers {
            tracing::info!(peers, required = self.min_peers, "not enough peers to forge");
            return RoundOutcome::InsufficientPeers { peers };
        }
        let height = match self.ledger.height() {
            Ok(height) => height,
            Err(e) => {
                tracing::error!(error = %e, "cannot read chain height");
                return RoundOutcome::Failed(e.to_string());
            }
        };
        match self.transport.solicit(height) {
            Ok(()) => {
                tracing::info!(height, peers, "forge request sent");
                RoundOutcome::Solicited { height }
            }
            Err(e) => {
                tracing::warn!(error = %e, "forge request not delivered");
                RoundOutcome::Failed(e.to_string())
            }
        }
    }

    /// Run a round every `period` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::debug!("forging scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.run_round();
                }
            }
        }
    }
}
