//! Cryptographic primitives for votechain.
//!
//! - **Ed25519** for signing ballots, stake bonds and message envelopes
//! - **SHA-256** for transaction ids and block hashes
//! - **Blake2b** for deriving address hashes from public keys
//! - Canonical JSON as the only signable payload encoding
//!
//! Everything that signs goes through the [`SigningAdapter`] trait so ledger,
//! consensus and network code never touch raw private keys.

pub mod canonical;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;
pub mod signer;

pub use canonical::canonical_json;
pub use encoding::{decode_public_key_b64, decode_signature_b64, encode_b64};
pub use error::CryptoError;
pub use hash::{blake2b_256, hash_public_key, sha256, sha256_multi};
pub use keys::{generate_keypair, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
pub use signer::{Ed25519Signer, SigningAdapter};
