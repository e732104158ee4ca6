//! Per-route authorization.
//!
//! Signatures are not checked when a frame is read; each route that needs a
//! trusted sender wraps its handler in [`Authorized`] with one of the
//! authorizers below.

use std::sync::Arc;

use votechain_ledger::Ledger;
use votechain_messages::{ErrorBody, Ping, Pong};
use votechain_types::PublicKey;

use crate::hub::ConnectionId;
use crate::router::Handler;
use crate::NetworkError;

pub trait Authorizer: Send + Sync {
    /// `Err(NetworkError::Unauthorized)` rejects the ping; any other error
    /// is a local failure.
    fn authorize(&self, ping: &Ping) -> Result<(), NetworkError>;
}

/// Accepts any ping whose signature matches its embedded sender key.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureAuthorizer;

impl Authorizer for SignatureAuthorizer {
    fn authorize(&self, ping: &Ping) -> Result<(), NetworkError> {
        ping.verify()
            .map_err(|e| NetworkError::Unauthorized(e.to_string()))
    }
}

/// Accepts only pings signed by one pinned key.
#[derive(Clone, Debug)]
pub struct PublicKeyAuthorizer {
    key: PublicKey,
}

impl PublicKeyAuthorizer {
    pub fn new(key: PublicKey) -> Self {
        Self { key }
    }
}

impl Authorizer for PublicKeyAuthorizer {
    fn authorize(&self, ping: &Ping) -> Result<(), NetworkError> {
        ping.verify_with(&self.key)
            .map_err(|_| NetworkError::Unauthorized("sender is not the pinned key".into()))
    }
}

/// Accepts validly signed pings from addresses that received a genesis grant.
pub struct KnownAddressAuthorizer {
    ledger: Arc<Ledger>,
}

impl KnownAddressAuthorizer {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }
}

impl Authorizer for KnownAddressAuthorizer {
    fn authorize(&self, ping: &Ping) -> Result<(), NetworkError> {
        SignatureAuthorizer.authorize(ping)?;
        let address = ping
            .sender_address()
            .map_err(|e| NetworkError::Unauthorized(e.to_string()))?;
        match self.ledger.is_known_address(&address) {
            Ok(true) => Ok(()),
            Ok(false) => Err(NetworkError::Unauthorized(format!(
                "address {} is not known",
                address.short()
            ))),
            Err(e) => Err(NetworkError::Handler(e.to_string())),
        }
    }
}

/// Runs `handler` only after `authorizer` accepts the ping.
pub struct Authorized<H, A> {
    handler: H,
    authorizer: A,
}

impl<H, A> Authorized<H, A> {
    pub fn new(handler: H, authorizer: A) -> Self {
        Self {
            handler,
            authorizer,
        }
    }
}

impl<H: Handler, A: Authorizer> Handler for Authorized<H, A> {
    fn handle(&self, ping: &Ping, connection: ConnectionId) -> Result<Pong, NetworkError> {
        match self.authorizer.authorize(ping) {
            Ok(()) => self.handler.handle(ping, connection),
            Err(NetworkError::Unauthorized(reason)) => {
                tracing::warn!(connection = %connection, message = %ping.message, %reason, "unauthorized");
                Ok(Pong::error(ErrorBody::unauthorized(reason)))
            }
            Err(e) => Err(e),
        }
    }
}

pub trait HandlerExt: Handler + Sized {
    fn authorized<A: Authorizer>(self, authorizer: A) -> Authorized<Self, A> {
        Authorized::new(self, authorizer)
    }
}

impl<H: Handler> HandlerExt for H {}
