//! Node assembly: storage, ledger, handlers, listener, forging timer and the
//! outbound registration flow.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use votechain_consensus::{ForgerScheduler, RoundOutcome};
use votechain_crypto::SigningAdapter;
use votechain_ledger::{create_genesis_block, Ledger};
use votechain_messages::Pong;
use votechain_network::{spawn_connection, ConnectionId, Hub, PeerClient, Router};
use votechain_rpc::{RpcServer, RpcState};
use votechain_store::{LedgerStore, PartyStore};
use votechain_store_lmdb::{environment::DEFAULT_MAP_SIZE, LmdbStore};
use votechain_types::{NodeType, Timestamp};

use crate::config::NodeConfig;
use crate::handlers::{build_router, NodeContext};
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;
use crate::sync::catch_up;
use crate::transport::HubTransport;
use crate::NodeError;

/// A running (or ready to run) votechain node.
pub struct VoteNode {
    config: NodeConfig,
    ctx: Arc<NodeContext>,
    router: Arc<Router>,
    parties: Arc<dyn PartyStore>,
    scheduler: Arc<ForgerScheduler>,
    shutdown: ShutdownController,
    node_id: Mutex<Option<String>>,
}

impl VoteNode {
    /// Open the LMDB store under `config.data_dir` and build the node.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        let store = Arc::new(LmdbStore::open(&config.data_dir, DEFAULT_MAP_SIZE)?);
        tracing::info!(data_dir = %config.data_dir.display(), "ledger store opened");
        Self::with_store(config, store)
    }

    /// Build the node over an existing store.
    pub fn with_store<S>(config: NodeConfig, store: Arc<S>) -> Result<Self, NodeError>
    where
        S: LedgerStore + PartyStore + 'static,
    {
        config.validate()?;
        let signer: Arc<dyn SigningAdapter> = Arc::new(config.signer()?);
        let authority_key = config.authority_key(signer.as_ref())?;
        let authority = votechain_crypto::hash_public_key(&authority_key);

        let ledger = Arc::new(Ledger::new(store.clone(), authority, config.params.clone()));
        let hub = Arc::new(Hub::new());
        let metrics = Arc::new(NodeMetrics::new()?);
        let ctx = Arc::new(NodeContext::new(
            ledger.clone(),
            hub.clone(),
            signer,
            metrics.clone(),
            authority_key,
        ));
        let router = Arc::new(build_router(ctx.clone()));
        let scheduler = Arc::new(ForgerScheduler::new(
            ledger,
            Arc::new(HubTransport::new(hub, metrics)),
            config.min_peers_for_round,
        ));

        Ok(Self {
            config,
            ctx,
            router,
            parties: store,
            scheduler,
            shutdown: ShutdownController::new(),
            node_id: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ctx.ledger
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.ctx.hub
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.ctx.metrics
    }

    pub fn signer(&self) -> &Arc<dyn SigningAdapter> {
        &self.ctx.signer
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Id announced to peers, known once the listener is bound.
    pub fn node_id(&self) -> Option<String> {
        self.node_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Create the genesis block on first start and store the ballot parties.
    /// Only meaningful on the authority.
    pub fn init_authority(&self) -> Result<(), NodeError> {
        let ledger = &self.ctx.ledger;
        if ledger.tip()?.is_zero() {
            let genesis = create_genesis_block(
                self.ctx.signer.as_ref(),
                &self.config.genesis.grants,
                Timestamp::now(),
                ledger.params(),
            )?;
            let hash = ledger.put_genesis(&genesis)?;
            tracing::info!(
                genesis = %hash,
                grants = self.config.genesis.grants.len(),
                "genesis block created"
            );
        }
        for party in &self.config.genesis.parties {
            self.parties.put_party(party)?;
        }
        Ok(())
    }

    /// Bind the listener and start every background task. A regular node
    /// also catches up with the authority and registers with it and with
    /// every peer it lists. Returns the bound peer address.
    pub async fn start(&self) -> Result<SocketAddr, NodeError> {
        if self.config.is_authority() {
            self.init_authority()?;
        }

        let listener = TcpListener::bind(&self.config.listen_address).await?;
        let local = listener.local_addr()?;
        let node_id = self
            .config
            .advertise_address
            .clone()
            .unwrap_or_else(|| local.to_string());
        *self.node_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(node_id.clone());
        tracing::info!(%local, node = %node_id, role = %self.config.role, "peer listener bound");

        tokio::spawn(accept_loop(
            listener,
            self.ctx.clone(),
            self.router.clone(),
            self.config.outbound_queue_capacity,
            self.shutdown.subscribe(),
        ));

        if self.config.is_authority() {
            let period = Duration::from_secs(self.config.forge_interval_secs);
            tokio::spawn(
                self.scheduler
                    .clone()
                    .run(period, self.shutdown.subscribe()),
            );
        } else {
            self.join_network(&node_id).await?;
        }

        if self.config.rpc_enabled {
            self.start_rpc().await?;
        }
        Ok(local)
    }

    /// Run one forging round now, outside the timer.
    pub fn run_round(&self) -> RoundOutcome {
        self.scheduler.run_round()
    }

    pub fn stop(&self) {
        tracing::info!("node stopping");
        self.shutdown.shutdown();
    }

    async fn start_rpc(&self) -> Result<SocketAddr, NodeError> {
        let state = RpcState {
            ledger: self.ctx.ledger.clone(),
            hub: self.ctx.hub.clone(),
            parties: self.parties.clone(),
            registry: Some(self.ctx.metrics.registry.clone()),
        };
        let server = RpcServer::bind(&self.config.rpc_address, state)
            .await
            .map_err(|e| NodeError::Rpc(e.to_string()))?;
        let addr = server
            .local_addr()
            .map_err(|e| NodeError::Rpc(e.to_string()))?;
        let shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = server.run(shutdown).await {
                tracing::error!(error = %e, "RPC server failed");
            }
        });
        Ok(addr)
    }

    async fn join_network(&self, node_id: &str) -> Result<(), NodeError> {
        let authority = self
            .config
            .authority_address
            .as_deref()
            .ok_or_else(|| NodeError::Config("authority_address is required".into()))?;

        let mut client = PeerClient::connect(authority, self.ctx.signer.clone())
            .await?
            .pin(self.ctx.authority_key);
        catch_up(&mut client, &self.ctx.ledger).await?;
        let peers = client.register(node_id).await?;
        self.attach(client, authority, NodeType::Authority)?;
        tracing::info!(authority, peers = peers.len(), "registered with the authority");

        for peer in peers.iter().filter(|p| p.as_str() != node_id) {
            if let Err(e) = self.dial_peer(peer, node_id).await {
                tracing::warn!(peer = %peer, error = %e, "could not register with peer");
            }
        }
        Ok(())
    }

    async fn dial_peer(&self, peer: &str, node_id: &str) -> Result<(), NodeError> {
        let mut client = PeerClient::connect(peer, self.ctx.signer.clone()).await?;
        client.register(node_id).await?;
        self.attach(client, peer, NodeType::Regular)?;
        tracing::info!(peer, "registered with peer");
        Ok(())
    }

    /// Hand a registered outbound stream to the connection tasks and record
    /// the remote in our own hub.
    fn attach(
        &self,
        client: PeerClient,
        remote_id: &str,
        node_type: NodeType,
    ) -> Result<ConnectionId, NodeError> {
        let connection = spawn_connection(
            client.into_stream(),
            self.ctx.hub.clone(),
            self.router.clone(),
            self.ctx.signer.clone(),
            self.config.outbound_queue_capacity,
        );
        let id = connection.id();
        self.ctx
            .hub
            .register_atomically(id, remote_id, node_type)?;
        self.ctx
            .metrics
            .peer_count
            .set(self.ctx.hub.registered_count() as i64);
        Ok(id)
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<NodeContext>,
    router: Arc<Router>,
    capacity: usize,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(peer = %addr, error = %e, "cannot set TCP_NODELAY");
                    }
                    let connection = spawn_connection(
                        stream,
                        ctx.hub.clone(),
                        router.clone(),
                        ctx.signer.clone(),
                        capacity,
                    );
                    tracing::debug!(peer = %addr, connection = %connection.id(), "accepted");
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            }
        }
    }
    let notified = ctx.hub.broadcast(&Pong::close_connection());
    tracing::info!(peers = notified, "peer listener stopped");
}
