//! Message handlers and the router that binds them to message types.

use std::fmt::Display;
use std::sync::Arc;

use votechain_consensus::{BlockAcceptor, BlockVerdict, ForgeOutcome, Forger};
use votechain_crypto::SigningAdapter;
use votechain_ledger::{Ledger, LedgerError};
use votechain_messages::{
    BlockBody, BlockForgedBody, ErrorBody, ForgeBlockBody, GetBlockBody, GetMissingBlocksBody,
    HeightBody, MessageType, MissingBlocksBody, PeersBody, Ping, Pong, RegisterBody,
    TransactionBody,
};
use votechain_network::{
    ConnectionId, HandlerExt, Hub, KnownAddressAuthorizer, NetworkError, PublicKeyAuthorizer,
    Router, SignatureAuthorizer,
};
use votechain_types::{NodeType, PublicKey};

use crate::metrics::NodeMetrics;

/// Everything a handler may touch.
pub struct NodeContext {
    pub ledger: Arc<Ledger>,
    pub hub: Arc<Hub>,
    pub signer: Arc<dyn SigningAdapter>,
    pub metrics: Arc<NodeMetrics>,
    pub authority_key: PublicKey,
    forger: Forger,
    acceptor: BlockAcceptor,
}

impl NodeContext {
    pub fn new(
        ledger: Arc<Ledger>,
        hub: Arc<Hub>,
        signer: Arc<dyn SigningAdapter>,
        metrics: Arc<NodeMetrics>,
        authority_key: PublicKey,
    ) -> Self {
        Self {
            forger: Forger::new(ledger.clone(), signer.clone()),
            acceptor: BlockAcceptor::new(ledger.clone(), signer.clone()),
            ledger,
            hub,
            signer,
            metrics,
            authority_key,
        }
    }

    fn update_peer_gauge(&self) {
        self.metrics
            .peer_count
            .set(self.hub.registered_count() as i64);
    }

    /// Push a transaction to every registered peer.
    fn announce(&self, transaction: &votechain_ledger::Transaction) -> Result<usize, NetworkError> {
        let pong = Pong::push(
            MessageType::TransactionReceived,
            &TransactionBody {
                transaction: transaction.clone(),
            },
        )?;
        Ok(self.hub.broadcast(&pong))
    }
}

/// Local failures surface as handler errors; the router answers them with
/// `unknown-error`.
fn local<E: Display>(e: E) -> NetworkError {
    NetworkError::Handler(e.to_string())
}

/// Build the router for a node.
pub fn build_router(ctx: Arc<NodeContext>) -> Router {
    let height = ctx.clone();
    let block = ctx.clone();
    let missing = ctx.clone();
    let registration = ctx.clone();
    let forge = ctx.clone();
    let forged = ctx.clone();
    let received = ctx.clone();
    let known = KnownAddressAuthorizer::new(ctx.ledger.clone());
    let authority = PublicKeyAuthorizer::new(ctx.authority_key);

    Router::new()
        .route(MessageType::GetHeight, move |ping: &Ping, conn: ConnectionId| {
            get_height(&height, ping, conn)
        })
        .route(MessageType::GetBlock, move |ping: &Ping, conn: ConnectionId| {
            get_block(&block, ping, conn)
        })
        .route(
            MessageType::GetMissingBlocks,
            move |ping: &Ping, conn: ConnectionId| get_missing_blocks(&missing, ping, conn),
        )
        .route(
            MessageType::Register,
            (move |ping: &Ping, conn: ConnectionId| register(&registration, ping, conn))
                .authorized(known),
        )
        .route(
            MessageType::ForgeBlock,
            (move |ping: &Ping, conn: ConnectionId| forge_block(&forge, ping, conn))
                .authorized(authority),
        )
        .route(
            MessageType::BlockForged,
            (move |ping: &Ping, conn: ConnectionId| block_forged(&forged, ping, conn))
                .authorized(SignatureAuthorizer),
        )
        .route(
            MessageType::TransactionReceived,
            (move |ping: &Ping, conn: ConnectionId| transaction_received(&received, ping, conn))
                .authorized(SignatureAuthorizer),
        )
}

fn get_height(ctx: &NodeContext, _: &Ping, _: ConnectionId) -> Result<Pong, NetworkError> {
    let height = ctx.ledger.height().map_err(local)?;
    Ok(Pong::response(&HeightBody { height })?)
}

fn get_block(ctx: &NodeContext, ping: &Ping, _: ConnectionId) -> Result<Pong, NetworkError> {
    let body: GetBlockBody = ping.decode_body()?;
    match ctx.ledger.get_block(&body.hash).map_err(local)? {
        Some(block) => Ok(Pong::response(&BlockBody { block })?),
        None => Ok(Pong::error(ErrorBody::block_not_found(&body.hash))),
    }
}

fn get_missing_blocks(
    ctx: &NodeContext,
    ping: &Ping,
    _: ConnectionId,
) -> Result<Pong, NetworkError> {
    let body: GetMissingBlocksBody = ping.decode_body()?;
    let tip = ctx.ledger.tip().map_err(local)?;
    let blocks = ctx
        .ledger
        .get_missing_blocks(tip, body.last_block)
        .map_err(local)?;
    Ok(Pong::response(&MissingBlocksBody { blocks })?)
}

fn register(ctx: &NodeContext, ping: &Ping, conn: ConnectionId) -> Result<Pong, NetworkError> {
    let body: RegisterBody = ping.decode_body()?;
    if body.node_id.is_empty() {
        return Ok(Pong::error(ErrorBody::invalid_data(MessageType::Register)));
    }
    let peers = ctx
        .hub
        .register_atomically(conn, &body.node_id, NodeType::Regular)?;
    ctx.update_peer_gauge();
    Ok(Pong::response(&PeersBody { peers })?)
}

fn forge_block(ctx: &NodeContext, ping: &Ping, _: ConnectionId) -> Result<Pong, NetworkError> {
    let body: ForgeBlockBody = ping.decode_body()?;
    match ctx.forger.forge(body.height).map_err(local)? {
        ForgeOutcome::Forged { block, height } => {
            ctx.metrics.blocks_forged.inc();
            let push = Pong::push(MessageType::BlockForged, &BlockForgedBody { height, block })?;
            let sent = ctx.hub.broadcast(&push);
            tracing::info!(height, peers = sent, "forged block announced");
        }
        outcome => tracing::debug!(?outcome, "nothing forged"),
    }
    Ok(Pong::no_action())
}

fn block_forged(ctx: &NodeContext, ping: &Ping, conn: ConnectionId) -> Result<Pong, NetworkError> {
    let body: BlockForgedBody = ping.decode_body()?;
    let sender = ping.sender_address()?;
    let verdict = ctx
        .acceptor
        .accept(&body.block, body.height, &sender)
        .map_err(local)?;
    match verdict {
        BlockVerdict::Accepted { hash, return_stake } => {
            ctx.metrics.blocks_accepted.inc();
            if let Some(refund) = return_stake {
                let sent = ctx.announce(&refund)?;
                tracing::info!(block = %hash, refund = %refund.id, peers = sent, "stake returned");
            }
            Ok(Pong::no_action())
        }
        BlockVerdict::Stale { reason } => {
            ctx.metrics.stale_blocks.inc();
            Ok(Pong::error(ErrorBody::stale_block(reason)))
        }
        BlockVerdict::Punished { stake, reason } => {
            ctx.metrics.blocks_punished.inc();
            if let Some(stake) = stake {
                ctx.announce(&stake)?;
            }
            tracing::warn!(
                connection = %conn,
                forger = %sender.short(),
                %reason,
                "disconnecting forger of invalid block"
            );
            Ok(Pong::disconnect())
        }
    }
}

fn transaction_received(
    ctx: &NodeContext,
    ping: &Ping,
    conn: ConnectionId,
) -> Result<Pong, NetworkError> {
    let body: TransactionBody = ping.decode_body()?;
    let tx = body.transaction;
    if !tx.id_matches().map_err(local)? {
        tracing::debug!(connection = %conn, tx = %tx.id, "transaction id does not match contents");
        return Ok(Pong::error(ErrorBody::invalid_data(
            MessageType::TransactionReceived,
        )));
    }
    match ctx.ledger.put_pending(&tx) {
        Ok(true) => {
            ctx.metrics.transactions_received.inc();
            tracing::debug!(connection = %conn, tx = %tx.id, "transaction pending");
        }
        Ok(false) => {}
        Err(LedgerError::InvalidTransaction(reason)) => {
            tracing::debug!(connection = %conn, tx = %tx.id, %reason, "transaction refused");
            return Ok(Pong::error(ErrorBody::invalid_data(
                MessageType::TransactionReceived,
            )));
        }
        Err(e) => return Err(local(e)),
    }
    Ok(Pong::no_action())
}
