//! Parse errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
}

/// Decode a hex string into a fixed-size byte array.
pub(crate) fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], TypesError> {
    let bytes = hex::decode(s).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| TypesError::InvalidLength {
            expected: N,
            actual,
        })
}
