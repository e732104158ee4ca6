//! The signing adapter seam.
//!
//! Ledger, consensus and network code sign through [`SigningAdapter`] and
//! verify through the free functions in [`crate::sign`]; only this module
//! holds a private key.

use crate::hash::hash_public_key;
use crate::keys::keypair_from_seed;
use crate::sign::sign_message;
use votechain_types::{AddressHash, KeyPair, PublicKey, Signature};

/// Something that can sign canonical payloads on behalf of one wallet.
pub trait SigningAdapter: Send + Sync {
    fn public_key(&self) -> PublicKey;

    fn sign(&self, payload: &[u8]) -> Signature;

    /// Address hash of this wallet.
    fn address(&self) -> AddressHash {
        hash_public_key(&self.public_key())
    }
}

/// Ed25519 wallet signer.
pub struct Ed25519Signer {
    keypair: KeyPair,
}

impl Ed25519Signer {
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(keypair_from_seed(seed))
    }
}

impl SigningAdapter for Ed25519Signer {
    fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    fn sign(&self, payload: &[u8]) -> Signature {
        sign_message(payload, &self.keypair.private)
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public", &self.keypair.public)
            .finish()
    }
}
