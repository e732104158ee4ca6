//! HTTP request handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use votechain_ledger::{Ledger, Transaction};
use votechain_messages::{MessageType, Pong, TransactionBody};
use votechain_network::Hub;
use votechain_store::{PartyStore, Utxo};
use votechain_types::{AddressHash, PublicKey, Signature, TxId};

use crate::error::RpcError;

/// Shared state of every handler.
#[derive(Clone)]
pub struct RpcState {
    pub ledger: Arc<Ledger>,
    pub hub: Arc<Hub>,
    pub parties: Arc<dyn PartyStore>,
    /// Metrics exposed at `/metrics`, when enabled.
    pub registry: Option<Registry>,
}

// ── Vote ─────────────────────────────────────────────────────────────────

/// A signed ballot. `signature` covers the spend payload
/// `{sender, recipient, value}` of the output being spent, and `verifier`
/// is the voter's public key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub sender: AddressHash,
    pub recipient: AddressHash,
    pub signature: Signature,
    pub verifier: PublicKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub transaction: TxId,
}

/// Run ledger and store work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, RpcError>
where
    F: FnOnce() -> Result<T, RpcError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RpcError::Server(format!("handler task failed: {e}")))?
}

pub async fn vote(
    State(state): State<RpcState>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteResponse>, RpcError> {
    let Json(request) = payload.map_err(|e| RpcError::InvalidRequest(e.body_text()))?;
    let tx = blocking(move || cast_ballot(&state, &request)).await?;
    Ok(Json(VoteResponse { transaction: tx.id }))
}

fn cast_ballot(state: &RpcState, request: &VoteRequest) -> Result<Transaction, RpcError> {
    let parties = state.parties.list_parties()?;
    if !parties.iter().any(|p| p.address == request.recipient) {
        return Err(RpcError::UnknownRecipient(request.recipient.to_string()));
    }
    if !state.ledger.is_known_address(&request.sender)? {
        return Err(RpcError::UnknownVoter(request.sender.to_string()));
    }

    let tx = state.ledger.cast_vote(
        &request.sender,
        &request.recipient,
        &request.signature,
        &request.verifier,
    )?;
    let push = Pong::push(
        MessageType::TransactionReceived,
        &TransactionBody {
            transaction: tx.clone(),
        },
    )
    .map_err(|e| RpcError::Server(e.to_string()))?;
    let peers = state.hub.broadcast(&push);
    tracing::info!(tx = %tx.id, peers, "ballot accepted");
    Ok(tx)
}

// ── Parties ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyTally {
    pub name: String,
    pub address: AddressHash,
    /// Votes received.
    pub balance: u64,
}

/// Parties with their tallies, most votes first, ties by name.
pub async fn parties(State(state): State<RpcState>) -> Result<Json<Vec<PartyTally>>, RpcError> {
    let tallies = blocking(move || {
        let mut tallies = Vec::new();
        for party in state.parties.list_parties()? {
            tallies.push(PartyTally {
                balance: state.ledger.balance(&party.address)?,
                name: party.name,
                address: party.address,
            });
        }
        tallies.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.name.cmp(&b.name)));
        Ok(tallies)
    })
    .await?;
    Ok(Json(tallies))
}

// ── Balance ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: AddressHash,
    /// Sum of `utxos`.
    pub balance: u64,
    /// Outputs not already spent by a pending transaction.
    pub utxos: Vec<Utxo>,
}

pub async fn balance(
    State(state): State<RpcState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, RpcError> {
    let address: AddressHash = address
        .parse()
        .map_err(|e| RpcError::InvalidRequest(format!("address: {e}")))?;
    let utxos = blocking(move || Ok(state.ledger.spendable_utxos(&address)?)).await?;
    Ok(Json(BalanceResponse {
        address,
        balance: Utxo::total(&utxos),
        utxos,
    }))
}

// ── Metrics ──────────────────────────────────────────────────────────────

pub async fn metrics(State(state): State<RpcState>) -> Result<impl IntoResponse, RpcError> {
    let registry = state.registry.as_ref().ok_or(RpcError::MetricsDisabled)?;
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| RpcError::Server(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    ))
}
