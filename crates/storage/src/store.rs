// Path: crates/storage/src/store.rs
use conductor_types::app::{Block, DayProof, ValidatorSet};
use conductor_types::codec;
use conductor_types::error::StorageError;
use conductor_types::keys::{
    block_key, proof_key, BLACKLIST_KEY, CURRENT_DAY_KEY, VALIDATORS_KEY,
};
use redb::{Database, ReadableTable, TableDefinition};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// The single key→value table. Namespacing lives in the keys.
const STATE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("CONDUCTOR_STATE");

/// Durable store for proofs, blocks, and validator-set state.
///
/// Cloning is cheap; all clones share the same database handle.
#[derive(Clone)]
pub struct ProofStore {
    db: Arc<Database>,
}

impl ProofStore {
    /// Opens (or creates) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        // Ensure the table exists so first reads do not fail.
        let w = db
            .begin_write()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        w.open_table(STATE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        w.commit()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        debug!(target: "storage", path = %path.as_ref().display(), "opened proof store");
        Ok(Self { db: Arc::new(db) })
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let w = self
            .db
            .begin_write()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        {
            let mut table = w
                .open_table(STATE)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        // redb commits are durable: the transaction is fsynced before this
        // returns, which is what makes a torn proof write impossible.
        w.commit()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let r = self
            .db
            .begin_read()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let table = r
            .open_table(STATE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let value = table
            .get(key)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    /// Persists a day proof under `proof:day:<n>`.
    pub fn save_proof(&self, proof: &DayProof) -> Result<(), StorageError> {
        self.put(&proof_key(proof.day_number), &codec::to_bytes_canonical(proof))?;
        debug!(target: "storage", day = proof.day_number, "saved day proof");
        Ok(())
    }

    /// Retrieves a day proof, if present.
    pub fn get_proof(&self, day_number: u32) -> Result<Option<DayProof>, StorageError> {
        match self.get(&proof_key(day_number))? {
            Some(bytes) => codec::from_bytes_canonical(&bytes)
                .map(Some)
                .map_err(StorageError::Corrupt),
            None => Ok(None),
        }
    }

    /// True when a proof for the day is stored locally.
    pub fn has_proof(&self, day_number: u32) -> Result<bool, StorageError> {
        Ok(self.get(&proof_key(day_number))?.is_some())
    }

    /// The highest day `d` such that proofs for `0..=d` are all present
    /// locally, or `None` when day 0 is missing.
    pub fn highest_contiguous_day(&self) -> Result<Option<u32>, StorageError> {
        let mut highest = None;
        let mut day = 0u32;
        while self.has_proof(day)? {
            highest = Some(day);
            day = match day.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(highest)
    }

    /// Persists a committed block under `block:epoch:<e>`.
    pub fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        self.put(&block_key(block.epoch), &codec::to_bytes_canonical(block))?;
        debug!(target: "storage", epoch = block.epoch, "saved committed block");
        Ok(())
    }

    /// Retrieves a committed block, if present.
    pub fn get_block(&self, epoch: u64) -> Result<Option<Block>, StorageError> {
        match self.get(&block_key(epoch))? {
            Some(bytes) => codec::from_bytes_canonical(&bytes)
                .map(Some)
                .map_err(StorageError::Corrupt),
            None => Ok(None),
        }
    }

    /// Persists the active validator set and the blacklist.
    pub fn save_validator_set(&self, set: &ValidatorSet) -> Result<(), StorageError> {
        self.put(VALIDATORS_KEY, &codec::to_bytes_canonical(&set.active))?;
        self.put(BLACKLIST_KEY, &codec::to_bytes_canonical(&set.blacklisted))
    }

    /// Retrieves the validator set, if one has been persisted.
    pub fn get_validator_set(&self) -> Result<Option<ValidatorSet>, StorageError> {
        let Some(active_bytes) = self.get(VALIDATORS_KEY)? else {
            return Ok(None);
        };
        let active: BTreeSet<conductor_types::app::ValidatorId> =
            codec::from_bytes_canonical(&active_bytes).map_err(StorageError::Corrupt)?;
        let blacklisted = match self.get(BLACKLIST_KEY)? {
            Some(bytes) => codec::from_bytes_canonical(&bytes).map_err(StorageError::Corrupt)?,
            None => BTreeSet::new(),
        };
        Ok(Some(ValidatorSet {
            active,
            blacklisted,
        }))
    }

    /// Records the last-advanced day.
    pub fn set_current_day(&self, day: u32) -> Result<(), StorageError> {
        self.put(CURRENT_DAY_KEY, &codec::to_bytes_canonical(&day))
    }

    /// The last-advanced day, if recorded.
    pub fn current_day(&self) -> Result<Option<u32>, StorageError> {
        match self.get(CURRENT_DAY_KEY)? {
            Some(bytes) => codec::from_bytes_canonical(&bytes)
                .map(Some)
                .map_err(StorageError::Corrupt),
            None => Ok(None),
        }
    }
}
