//! Per-connection reader and writer tasks.
//!
//! Every socket gets a bounded outbound queue registered with the [`Hub`].
//! The writer task drains it, signs each pong and writes it as a frame. The
//! reader task parses incoming frames, dispatches pushes through the
//! [`Router`] and queues the reply on the same connection.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use votechain_crypto::SigningAdapter;
use votechain_messages::{error_body, ErrorBody, MessageError, MessageType, Ping, Pong};

use crate::codec::{read_frame, write_ping};
use crate::hub::{ConnectionId, Hub};
use crate::router::Router;

/// Default outbound queue depth per connection.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;

/// A running connection. Dropping it leaves the tasks running.
pub struct Connection {
    id: ConnectionId,
    reader: JoinHandle<()>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Wait until the reader task has finished and the hub has forgotten
    /// the connection.
    pub async fn closed(self) {
        if let Err(e) = self.reader.await {
            tracing::error!(connection = %self.id, error = %e, "reader task panicked");
        }
    }
}

/// Start the reader and writer tasks for `stream`.
///
/// The connection is added to `hub` as pending; registering it under a node
/// id is up to the register handler (inbound) or the dialer (outbound).
pub fn spawn_connection<S>(
    stream: S,
    hub: Arc<Hub>,
    router: Arc<Router>,
    signer: Arc<dyn SigningAdapter>,
    capacity: usize,
) -> Connection
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (outbound, queue) = mpsc::channel(capacity.max(1));
    let id = hub.add(outbound.clone());
    tracing::debug!(connection = %id, "connection opened");

    tokio::spawn(write_loop(write_half, queue, signer, id));
    let reader = tokio::spawn(read_loop(read_half, outbound, hub, router, id));
    Connection { id, reader }
}

async fn write_loop<W>(
    mut writer: W,
    mut queue: mpsc::Receiver<Pong>,
    signer: Arc<dyn SigningAdapter>,
    id: ConnectionId,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(pong) = queue.recv().await {
        let closing = matches!(
            pong.message,
            MessageType::Disconnect | MessageType::CloseConnection
        );
        let ping = match pong.sign(signer.as_ref()) {
            Ok(ping) => ping,
            Err(e) => {
                tracing::error!(connection = %id, error = %e, "failed to sign outbound message");
                continue;
            }
        };
        if let Err(e) = write_ping(&mut writer, &ping).await {
            tracing::debug!(connection = %id, error = %e, "write failed");
            break;
        }
        if closing {
            tracing::debug!(connection = %id, "closing after {}", ping.message);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_loop<R>(
    mut reader: R,
    outbound: mpsc::Sender<Pong>,
    hub: Arc<Hub>,
    router: Arc<Router>,
    id: ConnectionId,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let bytes = match read_frame(&mut reader).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(connection = %id, error = %e, "read failed");
                break;
            }
        };

        let ping = match Ping::from_slice(&bytes) {
            Ok(ping) => ping,
            Err(MessageError::UnknownMessage(tag)) => {
                tracing::debug!(connection = %id, tag = %tag, "unknown message");
                if outbound
                    .send(Pong::error(ErrorBody::unknown_message(&tag)))
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
            Err(e) => {
                tracing::debug!(connection = %id, error = %e, "malformed frame");
                let reply = Pong::error(ErrorBody::new(error_body::INVALID_DATA, e.to_string()));
                if outbound.send(reply).await.is_err() {
                    break;
                }
                continue;
            }
        };

        match ping.message {
            MessageType::CloseConnection | MessageType::Disconnect => {
                tracing::debug!(connection = %id, message = %ping.message, "peer is closing");
                break;
            }
            message if message.is_reply() => {
                tracing::debug!(connection = %id, %message, body = %ping.body, "reply");
                continue;
            }
            _ => {}
        }

        let router = Arc::clone(&router);
        let pong = match tokio::task::spawn_blocking(move || router.dispatch(&ping, id)).await {
            Ok(pong) => pong,
            Err(e) => {
                tracing::error!(connection = %id, error = %e, "handler panicked");
                Pong::error(ErrorBody::unknown())
            }
        };
        let disconnect = pong.is_disconnect();
        if outbound.send(pong).await.is_err() || disconnect {
            break;
        }
    }
    hub.unregister(id);
    tracing::debug!(connection = %id, "connection closed");
}
