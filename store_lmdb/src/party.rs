//! LMDB implementation of [`PartyStore`].

use votechain_store::{Party, PartyStore, StoreError};

use crate::environment::LmdbStore;
use crate::LmdbError;

impl PartyStore for LmdbStore {
    fn put_party(&self, party: &Party) -> Result<(), StoreError> {
        let bytes = bincode::serialize(party).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.parties_db
            .put(&mut wtxn, party.address.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn list_parties(&self) -> Result<Vec<Party>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.parties_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut parties = Vec::new();
        for entry in iter {
            let (_key, value) = entry.map_err(LmdbError::from)?;
            parties.push(bincode::deserialize(value).map_err(LmdbError::from)?);
        }
        Ok(parties)
    }
}
