//! Ping and Pong envelopes.
//!
//! A [`Ping`] is what travels on the wire: a message tag, a JSON body, the
//! sender's base64 public key and a base64 signature over the canonical JSON
//! of `{message, sender, body}`. A [`Pong`] is a handler's unsigned reply;
//! the connection writer signs it into a `Ping` before sending.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use votechain_crypto::{
    canonical_json, decode_public_key_b64, decode_signature_b64, encode_b64, hash_public_key,
    verify_signature, SigningAdapter,
};
use votechain_types::{AddressHash, PublicKey};

use crate::{ErrorBody, MessageError, MessageType};

/// Signed message envelope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ping {
    pub message: MessageType,
    pub body: Value,
    /// Base64 public key of the sender.
    pub sender: String,
    /// Base64 signature over [`Ping::signable_bytes`].
    pub signature: String,
}

/// Envelope as read from the wire, before the tag is checked.
#[derive(Deserialize)]
struct RawPing {
    message: String,
    #[serde(default)]
    body: Value,
    sender: String,
    signature: String,
}

#[derive(Serialize)]
struct Signable<'a> {
    message: MessageType,
    sender: &'a str,
    body: &'a Value,
}

impl Ping {
    /// Build and sign a ping carrying `body`.
    pub fn signed<T: Serialize>(
        message: MessageType,
        body: &T,
        signer: &dyn SigningAdapter,
    ) -> Result<Self, MessageError> {
        let body = serde_json::to_value(body)?;
        Self::sign_value(message, body, signer)
    }

    fn sign_value(
        message: MessageType,
        body: Value,
        signer: &dyn SigningAdapter,
    ) -> Result<Self, MessageError> {
        let mut ping = Ping {
            message,
            body,
            sender: encode_b64(signer.public_key().as_bytes()),
            signature: String::new(),
        };
        ping.signature = encode_b64(signer.sign(&ping.signable_bytes()?).as_bytes());
        Ok(ping)
    }

    /// Canonical encoding of `{message, sender, body}`; the signature input.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, MessageError> {
        Ok(canonical_json(&Signable {
            message: self.message,
            sender: &self.sender,
            body: &self.body,
        })?)
    }

    pub fn sender_public_key(&self) -> Result<PublicKey, MessageError> {
        Ok(decode_public_key_b64(&self.sender)?)
    }

    pub fn sender_address(&self) -> Result<AddressHash, MessageError> {
        Ok(hash_public_key(&self.sender_public_key()?))
    }

    /// Check the signature against the embedded sender key.
    pub fn verify(&self) -> Result<(), MessageError> {
        self.verify_with(&self.sender_public_key()?)
    }

    /// Check the signature against `key`, which must also be the sender.
    pub fn verify_with(&self, key: &PublicKey) -> Result<(), MessageError> {
        if self.sender_public_key()? != *key {
            return Err(MessageError::BadSignature);
        }
        let signature = decode_signature_b64(&self.signature)?;
        if verify_signature(&self.signable_bytes()?, &signature, key) {
            Ok(())
        } else {
            Err(MessageError::BadSignature)
        }
    }

    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        Ok(T::deserialize(&self.body)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a wire frame. An unrecognised tag is reported as
    /// [`MessageError::UnknownMessage`] rather than a JSON error.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MessageError> {
        let raw: RawPing = serde_json::from_slice(bytes)?;
        Ok(Ping {
            message: raw.message.parse()?,
            body: raw.body,
            sender: raw.sender,
            signature: raw.signature,
        })
    }
}

/// Unsigned reply or push produced by a handler.
#[derive(Clone, Debug, PartialEq)]
pub struct Pong {
    pub message: MessageType,
    pub body: Value,
}

impl Pong {
    pub fn push<T: Serialize>(message: MessageType, body: &T) -> Result<Self, MessageError> {
        Ok(Self {
            message,
            body: serde_json::to_value(body)?,
        })
    }

    pub fn response<T: Serialize>(body: &T) -> Result<Self, MessageError> {
        Self::push(MessageType::Response, body)
    }

    pub fn error(error: ErrorBody) -> Self {
        Self {
            message: MessageType::Error,
            body: serde_json::json!({
                "name": error.name,
                "message": error.message,
            }),
        }
    }

    pub fn no_action() -> Self {
        Self {
            message: MessageType::NoAction,
            body: Value::Null,
        }
    }

    /// Tells the transport to flush and close the connection.
    pub fn disconnect() -> Self {
        Self {
            message: MessageType::Disconnect,
            body: Value::Null,
        }
    }

    pub fn close_connection() -> Self {
        Self {
            message: MessageType::CloseConnection,
            body: Value::Null,
        }
    }

    pub fn is_disconnect(&self) -> bool {
        self.message == MessageType::Disconnect
    }

    /// Error body, if this is an error reply.
    pub fn error_body(&self) -> Option<ErrorBody> {
        if self.message != MessageType::Error {
            return None;
        }
        ErrorBody::deserialize(&self.body).ok()
    }

    /// Sign this pong into a wire envelope.
    pub fn sign(self, signer: &dyn SigningAdapter) -> Result<Ping, MessageError> {
        Ping::sign_value(self.message, self.body, signer)
    }
}

impl From<Ping> for Pong {
    fn from(ping: Ping) -> Self {
        Pong {
            message: ping.message,
            body: ping.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ForgeBlockBody, HeightBody};
    use votechain_crypto::Ed25519Signer;

    fn signer() -> Ed25519Signer {
        Ed25519Signer::from_seed(&[4; 32])
    }

    #[test]
    fn signed_ping_verifies() {
        let signer = signer();
        let ping = Ping::signed(MessageType::ForgeBlock, &ForgeBlockBody { height: 5 }, &signer)
            .unwrap();
        ping.verify().unwrap();
        ping.verify_with(&signer.public_key()).unwrap();
        assert_eq!(ping.sender_address().unwrap(), signer.address());
        assert_eq!(ping.decode_body::<ForgeBlockBody>().unwrap().height, 5);
    }

    #[test]
    fn tampered_body_fails_verification() {
        let ping = Ping::signed(MessageType::ForgeBlock, &ForgeBlockBody { height: 5 }, &signer())
            .unwrap();
        let mut tampered = ping.clone();
        tampered.body = serde_json::json!({ "height": 6 });
        assert!(matches!(tampered.verify(), Err(MessageError::BadSignature)));

        let mut retagged = ping;
        retagged.message = MessageType::GetHeight;
        assert!(retagged.verify().is_err());
    }

    #[test]
    fn pinned_key_rejects_other_senders() {
        let ping = Ping::signed(MessageType::GetHeight, &Value::Null, &signer()).unwrap();
        let other = Ed25519Signer::from_seed(&[5; 32]);
        assert!(ping.verify_with(&other.public_key()).is_err());
    }

    #[test]
    fn field_order_does_not_affect_signature() {
        let signer = signer();
        let ping = Ping::signed(
            MessageType::Register,
            &serde_json::json!({ "b": 1, "a": 2 }),
            &signer,
        )
        .unwrap();
        let reordered: Value = serde_json::from_str(r#"{"a":2,"b":1}"#).unwrap();
        let mut copy = ping.clone();
        copy.body = reordered;
        copy.verify().unwrap();
    }

    #[test]
    fn wire_roundtrip_and_unknown_tag() {
        let ping = Ping::signed(MessageType::GetHeight, &Value::Null, &signer()).unwrap();
        let decoded = Ping::from_slice(&ping.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, ping);
        decoded.verify().unwrap();

        let unknown = br#"{"message":"get-blockchain-height","body":null,"sender":"","signature":""}"#;
        assert!(matches!(
            Ping::from_slice(unknown),
            Err(MessageError::UnknownMessage(_))
        ));
    }

    #[test]
    fn signed_pong_keeps_its_body() {
        let pong = Pong::response(&HeightBody { height: 3 }).unwrap();
        let ping = pong.clone().sign(&signer()).unwrap();
        ping.verify().unwrap();
        assert_eq!(Pong::from(ping), pong);
    }

    #[test]
    fn error_pong_carries_typed_body() {
        let pong = Pong::error(ErrorBody::unknown());
        let body = pong.error_body().unwrap();
        assert_eq!(body.name, crate::error_body::UNKNOWN_ERROR);
        assert!(Pong::no_action().error_body().is_none());
    }
}
