//! Base64 codecs for keys and signatures carried in message envelopes.

use crate::error::CryptoError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use votechain_types::{PublicKey, Signature};

pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], CryptoError> {
    let bytes = STANDARD
        .decode(s)
        .map_err(|e| CryptoError::Base64(e.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| CryptoError::Length {
        expected: N,
        actual,
    })
}

pub fn decode_public_key_b64(s: &str) -> Result<PublicKey, CryptoError> {
    decode_fixed::<32>(s).map(PublicKey)
}

pub fn decode_signature_b64(s: &str) -> Result<Signature, CryptoError> {
    decode_fixed::<64>(s).map(Signature)
}
