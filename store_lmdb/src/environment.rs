//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use votechain_types::BlockHash;

use crate::write_batch::WriteBatch;
use crate::LmdbError;

/// Default map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

const MAX_DBS: u32 = 8;

/// Key of the tip pointer in `meta_db`.
pub(crate) const TIP_KEY: &[u8] = b"tip";

/// The LMDB environment and every database handle.
///
/// | database | key | value |
/// |---|---|---|
/// | `meta` | `"tip"` | block hash |
/// | `blocks` | block hash | serialized block |
/// | `utxos` | outpoint key (36 bytes) | bincode [`votechain_store::Utxo`] |
/// | `utxos_by_address` | address ‖ outpoint key | empty |
/// | `pending` | tx id | timestamp (8 bytes BE) ‖ serialized tx |
/// | `pending_order` | timestamp (8 bytes BE) ‖ tx id | empty |
/// | `parties` | address | bincode [`votechain_store::Party`] |
pub struct LmdbStore {
    pub(crate) env: Env,
    pub(crate) meta_db: Database<Bytes, Bytes>,
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    pub(crate) utxo_db: Database<Bytes, Bytes>,
    pub(crate) address_db: Database<Bytes, Bytes>,
    pub(crate) pending_db: Database<Bytes, Bytes>,
    pub(crate) pending_order_db: Database<Bytes, Bytes>,
    pub(crate) parties_db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create an LMDB environment in `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per process and directory;
        // nothing else maps the same file.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        let blocks_db = env.create_database(&mut wtxn, Some("blocks"))?;
        let utxo_db = env.create_database(&mut wtxn, Some("utxos"))?;
        let address_db = env.create_database(&mut wtxn, Some("utxos_by_address"))?;
        let pending_db = env.create_database(&mut wtxn, Some("pending"))?;
        let pending_order_db = env.create_database(&mut wtxn, Some("pending_order"))?;
        let parties_db = env.create_database(&mut wtxn, Some("parties"))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env,
            meta_db,
            blocks_db,
            utxo_db,
            address_db,
            pending_db,
            pending_order_db,
            parties_db,
        })
    }

    /// Read the tip pointer inside an open transaction.
    pub(crate) fn tip_in(&self, txn: &RoTxn) -> Result<Option<BlockHash>, LmdbError> {
        match self.meta_db.get(txn, TIP_KEY)? {
            Some(bytes) => {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| LmdbError::Corrupt("tip pointer length".into()))?;
                Ok(Some(BlockHash::new(arr)))
            }
            None => Ok(None),
        }
    }

    /// Begin a write batch; dropping it without `commit` aborts everything.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, LmdbError> {
        WriteBatch::new(self)
    }
}
