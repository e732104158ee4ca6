//! Request/response client over a single framed stream.
//!
//! Used for outbound work that needs an answer before continuing: startup
//! catch-up and registration. Once registered, the stream is handed to
//! [`spawn_connection`](crate::spawn_connection) via [`PeerClient::into_stream`].

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use votechain_crypto::SigningAdapter;
use votechain_ledger::Block;
use votechain_messages::{
    error_body, BlockBody, GetBlockBody, GetMissingBlocksBody, HeightBody, MessageType,
    MissingBlocksBody, PeersBody, Ping, Pong, RegisterBody,
};
use votechain_types::{BlockHash, PublicKey};

use crate::codec::{read_ping, write_ping};
use crate::NetworkError;

/// Timeout for the TCP connect.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time to wait for a reply.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PeerClient<S = TcpStream> {
    stream: S,
    signer: Arc<dyn SigningAdapter>,
    timeout: Duration,
    pinned: Option<PublicKey>,
}

impl PeerClient<TcpStream> {
    pub async fn connect(addr: &str, signer: Arc<dyn SigningAdapter>) -> Result<Self, NetworkError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| NetworkError::Timeout)??;
        stream.set_nodelay(true)?;
        tracing::debug!(peer = addr, "connected");
        Ok(Self::new(stream, signer))
    }
}

impl<S> PeerClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, signer: Arc<dyn SigningAdapter>) -> Self {
        Self {
            stream,
            signer,
            timeout: REQUEST_TIMEOUT,
            pinned: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Only accept replies signed by `key`.
    pub fn pin(mut self, key: PublicKey) -> Self {
        self.pinned = Some(key);
        self
    }

    /// Send a push without waiting for anything back.
    pub async fn push<T: Serialize>(
        &mut self,
        message: MessageType,
        body: &T,
    ) -> Result<(), NetworkError> {
        let ping = Ping::signed(message, body, self.signer.as_ref())?;
        write_ping(&mut self.stream, &ping).await
    }

    /// Send `message` and wait for the matching reply. Pushes that arrive in
    /// between are skipped. Error replies become [`NetworkError::Remote`].
    pub async fn request<T: Serialize>(
        &mut self,
        message: MessageType,
        body: &T,
    ) -> Result<Ping, NetworkError> {
        self.push(message, body).await?;
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.read_reply(message))
            .await
            .map_err(|_| NetworkError::Timeout)?
    }

    async fn read_reply(&mut self, request: MessageType) -> Result<Ping, NetworkError> {
        loop {
            let ping = read_ping(&mut self.stream)
                .await?
                .ok_or(NetworkError::Closed)?;
            match ping.message {
                MessageType::Disconnect | MessageType::CloseConnection => {
                    return Err(NetworkError::Closed)
                }
                message if message.is_reply() => {
                    match &self.pinned {
                        Some(key) => ping.verify_with(key)?,
                        None => ping.verify()?,
                    }
                    let reply = Pong::from(ping.clone());
                    if let Some(error) = reply.error_body() {
                        tracing::debug!(%request, error = %error, "error reply");
                        return Err(NetworkError::Remote(error));
                    }
                    return Ok(ping);
                }
                message => {
                    tracing::debug!(%request, %message, "skipping push while awaiting reply");
                }
            }
        }
    }

    async fn call<T: Serialize, R: DeserializeOwned>(
        &mut self,
        message: MessageType,
        body: &T,
    ) -> Result<R, NetworkError> {
        let reply = self.request(message, body).await?;
        if reply.message != MessageType::Response {
            return Err(NetworkError::UnexpectedReply(reply.message));
        }
        Ok(reply.decode_body()?)
    }

    pub async fn get_height(&mut self) -> Result<u64, NetworkError> {
        let body: HeightBody = self
            .call(MessageType::GetHeight, &serde_json::Value::Null)
            .await?;
        Ok(body.height)
    }

    /// Hashes the peer has after `last_block`, oldest first.
    pub async fn get_missing_blocks(
        &mut self,
        last_block: &BlockHash,
    ) -> Result<Vec<BlockHash>, NetworkError> {
        let body: MissingBlocksBody = self
            .call(
                MessageType::GetMissingBlocks,
                &GetMissingBlocksBody {
                    last_block: *last_block,
                },
            )
            .await?;
        Ok(body.blocks)
    }

    /// `None` when the peer does not have the block.
    pub async fn get_block(&mut self, hash: &BlockHash) -> Result<Option<Block>, NetworkError> {
        match self
            .call::<_, BlockBody>(MessageType::GetBlock, &GetBlockBody { hash: *hash })
            .await
        {
            Ok(body) => Ok(Some(body.block)),
            Err(NetworkError::Remote(error)) if error.name == error_body::BLOCK_NOT_FOUND => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Register under `node_id`; returns the peers registered before us.
    pub async fn register(&mut self, node_id: &str) -> Result<Vec<String>, NetworkError> {
        let body: PeersBody = self
            .call(
                MessageType::Register,
                &RegisterBody {
                    node_id: node_id.to_string(),
                },
            )
            .await?;
        Ok(body.peers)
    }

    pub fn into_stream(self) -> S {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{spawn_connection, ConnectionId, Hub, Router};
    use votechain_crypto::Ed25519Signer;
    use votechain_messages::{ErrorBody, ForgeBlockBody};
    use votechain_types::NodeType;

    fn signer(seed: u8) -> Arc<dyn SigningAdapter> {
        Arc::new(Ed25519Signer::from_seed(&[seed; 32]))
    }

    fn server(hub: Arc<Hub>) -> Arc<Router> {
        let register_hub = hub.clone();
        let push_hub = hub;
        Arc::new(
            Router::new()
                .route(
                    MessageType::GetHeight,
                    move |_: &Ping, conn: ConnectionId| -> Result<Pong, NetworkError> {
                        // a push queued ahead of the reply
                        push_hub.send_to(
                            conn,
                            Pong::push(MessageType::ForgeBlock, &ForgeBlockBody { height: 1 })?,
                        )?;
                        Ok(Pong::response(&HeightBody { height: 4 })?)
                    },
                )
                .route(
                    MessageType::GetBlock,
                    |ping: &Ping, _: ConnectionId| -> Result<Pong, NetworkError> {
                        let body: GetBlockBody = ping.decode_body()?;
                        Ok(Pong::error(ErrorBody::block_not_found(&body.hash)))
                    },
                )
                .route(
                    MessageType::Register,
                    move |ping: &Ping, conn: ConnectionId| -> Result<Pong, NetworkError> {
                        let body: RegisterBody = ping.decode_body()?;
                        let peers =
                            register_hub.register_atomically(conn, &body.node_id, NodeType::Regular)?;
                        Ok(Pong::response(&PeersBody { peers })?)
                    },
                ),
        )
    }

    #[tokio::test]
    async fn typed_calls_against_a_live_connection() {
        let (local, remote) = tokio::io::duplex(8192);
        let hub = Arc::new(Hub::new());
        let server_key = signer(1);
        spawn_connection(local, hub.clone(), server(hub.clone()), server_key.clone(), 5);

        let mut client = PeerClient::new(remote, signer(2)).pin(server_key.public_key());
        assert_eq!(client.get_height().await.unwrap(), 4);
        assert_eq!(client.get_block(&BlockHash::new([9; 32])).await.unwrap(), None);
        assert!(client.register("10.0.0.2:7000").await.unwrap().is_empty());
        assert!(hub.is_registered("10.0.0.2:7000"));
    }

    #[tokio::test]
    async fn replies_from_another_key_are_refused() {
        let (local, remote) = tokio::io::duplex(8192);
        let hub = Arc::new(Hub::new());
        spawn_connection(local, hub.clone(), server(hub), signer(1), 5);

        let mut client = PeerClient::new(remote, signer(2)).pin(signer(3).public_key());
        assert!(matches!(
            client.get_height().await,
            Err(NetworkError::Message(_))
        ));
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let (_local, remote) = tokio::io::duplex(8192);
        let mut client =
            PeerClient::new(remote, signer(2)).with_timeout(Duration::from_millis(50));
        assert!(matches!(client.get_height().await, Err(NetworkError::Timeout)));
    }

    #[tokio::test]
    async fn closed_peer_is_reported() {
        let (local, remote) = tokio::io::duplex(8192);
        drop(local);
        let mut client = PeerClient::new(remote, signer(2));
        assert!(client.get_height().await.is_err());
    }
}
