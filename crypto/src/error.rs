use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("canonical encoding failed: {0}")]
    Encoding(String),

    #[error("invalid base64: {0}")]
    Base64(String),

    #[error("invalid key or signature length: expected {expected}, got {actual}")]
    Length { expected: usize, actual: usize },
}
