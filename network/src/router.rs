//! Message routing: one handler per message type.

use std::collections::HashMap;
use std::sync::Arc;

use votechain_messages::{ErrorBody, MessageError, MessageType, Ping, Pong};

use crate::hub::ConnectionId;
use crate::NetworkError;

/// Handles one kind of ping arriving on `connection`.
pub trait Handler: Send + Sync {
    fn handle(&self, ping: &Ping, connection: ConnectionId) -> Result<Pong, NetworkError>;
}

impl<F> Handler for F
where
    F: Fn(&Ping, ConnectionId) -> Result<Pong, NetworkError> + Send + Sync,
{
    fn handle(&self, ping: &Ping, connection: ConnectionId) -> Result<Pong, NetworkError> {
        self(ping, connection)
    }
}

#[derive(Default)]
pub struct Router {
    routes: HashMap<MessageType, Arc<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<H: Handler + 'static>(mut self, message: MessageType, handler: H) -> Self {
        self.routes.insert(message, Arc::new(handler));
        self
    }

    pub fn handles(&self, message: MessageType) -> bool {
        self.routes.contains_key(&message)
    }

    /// Run the handler for `ping`. Handler failures become error pongs; the
    /// caller always has something to send back.
    pub fn dispatch(&self, ping: &Ping, connection: ConnectionId) -> Pong {
        let Some(handler) = self.routes.get(&ping.message) else {
            tracing::debug!(connection = %connection, message = %ping.message, "no route");
            return Pong::error(ErrorBody::unknown_message(ping.message.as_str()));
        };
        tracing::debug!(connection = %connection, message = %ping.message, "routing");
        match handler.handle(ping, connection) {
            Ok(pong) => pong,
            Err(NetworkError::Message(MessageError::Json(e))) => {
                tracing::debug!(connection = %connection, message = %ping.message, error = %e, "bad body");
                Pong::error(ErrorBody::invalid_data(ping.message))
            }
            Err(NetworkError::Unauthorized(reason)) => Pong::error(ErrorBody::unauthorized(reason)),
            Err(e) => {
                tracing::error!(connection = %connection, message = %ping.message, error = %e, "handler failed");
                Pong::error(ErrorBody::unknown())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use votechain_crypto::Ed25519Signer;
    use votechain_messages::{error_body, ForgeBlockBody, HeightBody};

    fn ping(message: MessageType, body: serde_json::Value) -> Ping {
        Ping::signed(message, &body, &Ed25519Signer::from_seed(&[3; 32])).unwrap()
    }

    fn conn() -> ConnectionId {
        crate::Hub::new().add(tokio::sync::mpsc::channel(1).0)
    }

    fn router() -> Router {
        Router::new().route(
            MessageType::ForgeBlock,
            |ping: &Ping, _conn: ConnectionId| -> Result<Pong, NetworkError> {
                let body: ForgeBlockBody = ping.decode_body()?;
                Ok(Pong::response(&HeightBody {
                    height: body.height + 1,
                })?)
            },
        )
    }

    #[test]
    fn routes_by_message_type() {
        let pong = router().dispatch(
            &ping(MessageType::ForgeBlock, serde_json::json!({ "height": 4 })),
            conn(),
        );
        assert_eq!(pong.message, MessageType::Response);
        assert_eq!(pong.body["height"], 5);
    }

    #[test]
    fn unknown_route_is_message_unknown() {
        let pong = router().dispatch(&ping(MessageType::GetBlock, serde_json::json!({})), conn());
        assert_eq!(pong.error_body().unwrap().name, error_body::UNKNOWN_MESSAGE);
    }

    #[test]
    fn bad_body_is_invalid_data() {
        let pong = router().dispatch(
            &ping(MessageType::ForgeBlock, serde_json::json!({ "height": "x" })),
            conn(),
        );
        assert_eq!(pong.error_body().unwrap().name, error_body::INVALID_DATA);
    }

    #[test]
    fn handler_failure_is_unknown_error() {
        let router = Router::new().route(
            MessageType::GetHeight,
            |_: &Ping, _: ConnectionId| -> Result<Pong, NetworkError> {
                Err(NetworkError::Handler("store offline".into()))
            },
        );
        let pong = router.dispatch(&ping(MessageType::GetHeight, serde_json::Value::Null), conn());
        assert_eq!(pong.error_body().unwrap().name, error_body::UNKNOWN_ERROR);
    }
}
