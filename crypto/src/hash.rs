//! SHA-256 for content ids, Blake2b for address derivation.

use blake2::digest::consts::U32;
use blake2::Blake2b;
use sha2::{Digest, Sha256};
use votechain_types::{AddressHash, PublicKey};

type Blake2b256 = Blake2b<U32>;

/// SHA-256 of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&Sha256::digest(data));
    output
}

/// SHA-256 over several slices in sequence (avoids concatenation allocation).
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// 256-bit Blake2b of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Address hash owning outputs paid to `public_key`.
pub fn hash_public_key(public_key: &PublicKey) -> AddressHash {
    AddressHash::new(blake2b_256(public_key.as_bytes()))
}
