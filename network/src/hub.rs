//! Peer hub: the registry of live connections.
//!
//! A connection enters the hub as *pending* as soon as its transport is up,
//! and becomes *registered* once the remote identifies itself. Only
//! registered connections receive broadcasts. All state sits behind one
//! mutex, so a registration and the peer snapshot it returns are a single
//! step.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use votechain_messages::Pong;
use votechain_types::NodeType;

use crate::NetworkError;

/// Process-local connection handle. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Registered peer, as reported to callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub connection: ConnectionId,
    pub node_id: String,
    pub node_type: NodeType,
}

struct Registered {
    node_id: String,
    node_type: NodeType,
    outbound: mpsc::Sender<Pong>,
}

#[derive(Default)]
struct HubState {
    pending: HashMap<ConnectionId, mpsc::Sender<Pong>>,
    registered: HashMap<ConnectionId, Registered>,
    last_unicast: Option<ConnectionId>,
}

#[derive(Default)]
pub struct Hub {
    state: Mutex<HubState>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a connection whose remote has not identified itself yet.
    pub fn add(&self, outbound: mpsc::Sender<Pong>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().pending.insert(id, outbound);
        tracing::debug!(connection = %id, "connection added");
        id
    }

    /// Promote a pending connection to registered under `node_id`.
    ///
    /// Returns the node ids registered before this call, never including
    /// `node_id` itself.
    pub fn register_atomically(
        &self,
        connection: ConnectionId,
        node_id: &str,
        node_type: NodeType,
    ) -> Result<Vec<String>, NetworkError> {
        let mut state = self.lock();
        let mut snapshot: Vec<String> = state
            .registered
            .values()
            .filter(|p| p.node_id != node_id)
            .map(|p| p.node_id.clone())
            .collect();
        snapshot.sort();
        snapshot.dedup();

        let outbound = state
            .pending
            .remove(&connection)
            .ok_or(NetworkError::UnknownConnection(connection))?;
        state.registered.insert(
            connection,
            Registered {
                node_id: node_id.to_string(),
                node_type,
                outbound,
            },
        );
        tracing::info!(connection = %connection, node = node_id, %node_type, "peer registered");
        Ok(snapshot)
    }

    /// Forget `connection`, pending or registered. Idempotent.
    pub fn unregister(&self, connection: ConnectionId) -> bool {
        let mut state = self.lock();
        let was_pending = state.pending.remove(&connection).is_some();
        let was_registered = state.registered.remove(&connection);
        if state.last_unicast == Some(connection) {
            state.last_unicast = None;
        }
        if let Some(peer) = &was_registered {
            tracing::info!(connection = %connection, node = %peer.node_id, "peer unregistered");
        }
        was_pending || was_registered.is_some()
    }

    /// Queue `pong` on every registered connection. Returns how many queues
    /// accepted it; full queues drop the message.
    pub fn broadcast(&self, pong: &Pong) -> usize {
        let state = self.lock();
        state
            .registered
            .iter()
            .filter(|(id, peer)| Self::enqueue(**id, peer, pong))
            .count()
    }

    /// Queue `pong` on one random registered connection, avoiding the one
    /// picked last time when there is a choice.
    pub fn random_unicast(&self, pong: &Pong) -> Result<ConnectionId, NetworkError> {
        let mut state = self.lock();
        let mut candidates: Vec<ConnectionId> = state.registered.keys().copied().collect();
        if candidates.len() > 1 {
            if let Some(last) = state.last_unicast {
                candidates.retain(|id| *id != last);
            }
        }
        let chosen = *candidates
            .choose(&mut rand::thread_rng())
            .ok_or(NetworkError::NoPeers)?;
        state.last_unicast = Some(chosen);
        let peer = state
            .registered
            .get(&chosen)
            .ok_or(NetworkError::UnknownConnection(chosen))?;
        if Self::enqueue(chosen, peer, pong) {
            Ok(chosen)
        } else {
            Err(NetworkError::QueueFull(chosen))
        }
    }

    /// Like [`Hub::broadcast`], capped at `max` deliveries and skipping peers
    /// whose node id is in `exclude`.
    pub fn multicast(&self, pong: &Pong, max: usize, exclude: &[String]) -> usize {
        let state = self.lock();
        let mut sent = 0;
        for (id, peer) in &state.registered {
            if sent >= max {
                break;
            }
            if exclude.contains(&peer.node_id) {
                continue;
            }
            if Self::enqueue(*id, peer, pong) {
                sent += 1;
            }
        }
        sent
    }

    /// Queue `pong` on one connection, pending or registered.
    pub fn send_to(&self, connection: ConnectionId, pong: Pong) -> Result<(), NetworkError> {
        let state = self.lock();
        let outbound = state
            .registered
            .get(&connection)
            .map(|p| &p.outbound)
            .or_else(|| state.pending.get(&connection))
            .ok_or(NetworkError::UnknownConnection(connection))?;
        outbound
            .try_send(pong)
            .map_err(|_| NetworkError::QueueFull(connection))
    }

    fn enqueue(id: ConnectionId, peer: &Registered, pong: &Pong) -> bool {
        match peer.outbound.try_send(pong.clone()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(connection = %id, node = %peer.node_id, error = %e, "outbound queue rejected message");
                false
            }
        }
    }

    pub fn registered_count(&self) -> usize {
        self.lock().registered.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_registered(&self, node_id: &str) -> bool {
        self.lock().registered.values().any(|p| p.node_id == node_id)
    }

    pub fn node_id_of(&self, connection: ConnectionId) -> Option<String> {
        self.lock()
            .registered
            .get(&connection)
            .map(|p| p.node_id.clone())
    }

    pub fn peers(&self) -> Vec<PeerInfo> {
        let mut peers: Vec<PeerInfo> = self
            .lock()
            .registered
            .iter()
            .map(|(id, p)| PeerInfo {
                connection: *id,
                node_id: p.node_id.clone(),
                node_type: p.node_type,
            })
            .collect();
        peers.sort_by_key(|p| p.connection);
        peers
    }
}
