//! Ballot parties.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use votechain_types::AddressHash;

/// A candidate that ballots can be cast for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub address: AddressHash,
}

/// Registry of parties, keyed by address.
pub trait PartyStore: Send + Sync {
    /// Insert or replace a party.
    fn put_party(&self, party: &Party) -> Result<(), StoreError>;

    /// All parties, ordered by address.
    fn list_parties(&self) -> Result<Vec<Party>, StoreError>;
}
