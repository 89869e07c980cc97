//! State snapshot interface consumed by interop services

use crate::error::VmError;
use bytes::Bytes;
use std::collections::BTreeMap;
use tessera_primitives::ScriptHash;
use thiserror::Error;

/// Snapshot errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backing store failure
    #[error("backend error: {0}")]
    Backend(String),

    /// Stored data could not be interpreted
    #[error("invalid data format: {0}")]
    InvalidFormat(String),
}

/// Result type for snapshot operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for VmError {
    fn from(err: StorageError) -> Self {
        VmError::Storage(err.to_string())
    }
}

/// Read access to contract state
pub trait SnapshotReader {
    /// Get a storage value
    fn get_storage(&self, contract: &ScriptHash, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Get contract code by hash
    fn get_contract(&self, hash: &ScriptHash) -> StorageResult<Option<Bytes>>;

    /// Check if a contract exists
    fn contract_exists(&self, hash: &ScriptHash) -> StorageResult<bool> {
        Ok(self.get_contract(hash)?.is_some())
    }
}

/// Write access to contract state
pub trait SnapshotWriter {
    /// Set a storage value
    fn put_storage(&mut self, contract: ScriptHash, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a storage value
    fn delete_storage(&mut self, contract: &ScriptHash, key: &[u8]) -> StorageResult<()>;

    /// Store contract code
    fn put_contract(&mut self, hash: ScriptHash, code: Bytes) -> StorageResult<()>;
}

/// Combined read/write snapshot
pub trait StateSnapshot: SnapshotReader + SnapshotWriter {}

impl<T: SnapshotReader + SnapshotWriter> StateSnapshot for T {}

/// Deterministic in-memory snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    storage: BTreeMap<(ScriptHash, Vec<u8>), Vec<u8>>,
    contracts: BTreeMap<ScriptHash, Bytes>,
}

impl MemorySnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `code` under its script hash and return the hash
    pub fn deploy(&mut self, code: impl Into<Bytes>) -> ScriptHash {
        let code = code.into();
        let hash = tessera_crypto::script_hash(&code);
        self.contracts.insert(hash, code);
        hash
    }

    /// Number of storage entries
    pub fn storage_len(&self) -> usize {
        self.storage.len()
    }

    /// Number of stored contracts
    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    /// Storage entries of one contract in key order
    pub fn storage_of<'a>(
        &'a self,
        contract: &'a ScriptHash,
    ) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.storage
            .iter()
            .filter(move |((owner, _), _)| owner == contract)
            .map(|((_, key), value)| (key.as_slice(), value.as_slice()))
    }
}

impl SnapshotReader for MemorySnapshot {
    fn get_storage(&self, contract: &ScriptHash, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.storage.get(&(*contract, key.to_vec())).cloned())
    }

    fn get_contract(&self, hash: &ScriptHash) -> StorageResult<Option<Bytes>> {
        Ok(self.contracts.get(hash).cloned())
    }
}

impl SnapshotWriter for MemorySnapshot {
    fn put_storage(&mut self, contract: ScriptHash, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.storage.insert((contract, key), value);
        Ok(())
    }

    fn delete_storage(&mut self, contract: &ScriptHash, key: &[u8]) -> StorageResult<()> {
        self.storage.remove(&(*contract, key.to_vec()));
        Ok(())
    }

    fn put_contract(&mut self, hash: ScriptHash, code: Bytes) -> StorageResult<()> {
        self.contracts.insert(hash, code);
        Ok(())
    }
}

/// Buffered writes of one invocation chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Storage writes (`None` = deleted)
    storage: BTreeMap<(ScriptHash, Vec<u8>), Option<Vec<u8>>>,
    /// Deployed contracts
    contracts: BTreeMap<ScriptHash, Bytes>,
}

impl ChangeSet {
    /// Check if nothing was written
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty() && self.contracts.is_empty()
    }

    /// Number of buffered storage writes
    pub fn storage_count(&self) -> usize {
        self.storage.len()
    }

    /// Apply every buffered write in key order
    pub fn apply_to(self, target: &mut dyn StateSnapshot) -> StorageResult<()> {
        for (hash, code) in self.contracts {
            target.put_contract(hash, code)?;
        }
        for ((contract, key), value) in self.storage {
            match value {
                Some(value) => target.put_storage(contract, key, value)?,
                None => target.delete_storage(&contract, &key)?,
            }
        }
        Ok(())
    }
}

/// Write-buffering layer over a read-only snapshot
pub struct CachedSnapshot<'a, R: SnapshotReader + ?Sized> {
    changes: ChangeSet,
    underlying: &'a R,
}

impl<'a, R: SnapshotReader + ?Sized> CachedSnapshot<'a, R> {
    /// Create a new cached layer
    pub fn new(underlying: &'a R) -> Self {
        Self {
            changes: ChangeSet::default(),
            underlying,
        }
    }

    /// Buffered writes
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Take ownership of the buffered writes
    pub fn into_changes(self) -> ChangeSet {
        self.changes
    }
}

impl<R: SnapshotReader + ?Sized> SnapshotReader for CachedSnapshot<'_, R> {
    fn get_storage(&self, contract: &ScriptHash, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        if let Some(cached) = self.changes.storage.get(&(*contract, key.to_vec())) {
            return Ok(cached.clone());
        }
        self.underlying.get_storage(contract, key)
    }

    fn get_contract(&self, hash: &ScriptHash) -> StorageResult<Option<Bytes>> {
        if let Some(cached) = self.changes.contracts.get(hash) {
            return Ok(Some(cached.clone()));
        }
        self.underlying.get_contract(hash)
    }
}

impl<R: SnapshotReader + ?Sized> SnapshotWriter for CachedSnapshot<'_, R> {
    fn put_storage(&mut self, contract: ScriptHash, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.changes.storage.insert((contract, key), Some(value));
        Ok(())
    }

    fn delete_storage(&mut self, contract: &ScriptHash, key: &[u8]) -> StorageResult<()> {
        self.changes.storage.insert((*contract, key.to_vec()), None);
        Ok(())
    }

    fn put_contract(&mut self, hash: ScriptHash, code: Bytes) -> StorageResult<()> {
        self.changes.contracts.insert(hash, code);
        Ok(())
    }
}
