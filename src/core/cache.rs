//! Durable stage cache.
//!
//! Successful stage payloads are persisted under a typed
//! `(document, stage, schema version)` key inside a versioned JSON
//! envelope. Bump `SCHEMA_VERSION` whenever a payload shape changes so old
//! entries are ignored instead of misread.
//!
//! Cache I/O never fails a run: `StageCache` logs every read/write error
//! and reports it as a miss.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::{DocumentId, Stage, StagePayload};

/// Version of the payload shapes written to the cache
pub const SCHEMA_VERSION: u32 = 1;

/// Typed cache key, rendered as `{documentId}:{stage}:{schemaVersion}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub document_id: DocumentId,
    pub stage: Stage,
    pub schema_version: u32,
}

impl CacheKey {
    pub fn new(document_id: DocumentId, stage: Stage, schema_version: u32) -> Self {
        Self {
            document_id,
            stage,
            schema_version,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.document_id, self.stage, self.schema_version)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Schema version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Entry belongs to {found}, expected {expected}")]
    KeyMismatch { found: String, expected: String },

    #[error("Failed to persist entry: {0}")]
    Persist(String),
}

/// Backing medium for cache entries
#[async_trait]
pub trait DurableCache: Send + Sync {
    /// Bytes stored under `key`, `None` when absent
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store bytes under `key` (last write wins)
    async fn write(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<(), CacheError>;

    /// Delete the entry under `key`; deleting a missing entry is not an error
    async fn remove(&self, key: &CacheKey) -> Result<(), CacheError>;
}

/// Versioned on-disk representation of a cached payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEnvelope {
    pub schema_version: u32,
    pub document_id: DocumentId,
    pub stage: Stage,
    pub written_at_epoch_ms: i64,
    pub payload: StagePayload,
}

/// Serialize a payload for `key`
pub fn encode_entry(key: &CacheKey, payload: &StagePayload) -> Result<Vec<u8>, CacheError> {
    let envelope = CacheEnvelope {
        schema_version: key.schema_version,
        document_id: key.document_id.clone(),
        stage: key.stage,
        written_at_epoch_ms: Utc::now().timestamp_millis(),
        payload: payload.clone(),
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

/// Parse and check an entry read for `key`
pub fn decode_entry(key: &CacheKey, bytes: &[u8]) -> Result<CacheEnvelope, CacheError> {
    let envelope: CacheEnvelope = serde_json::from_slice(bytes)?;

    if envelope.schema_version != key.schema_version {
        return Err(CacheError::VersionMismatch {
            found: envelope.schema_version,
            expected: key.schema_version,
        });
    }

    let found = CacheKey::new(
        envelope.document_id.clone(),
        envelope.payload.stage(),
        envelope.schema_version,
    );
    if envelope.document_id != key.document_id
        || envelope.stage != key.stage
        || envelope.payload.stage() != key.stage
    {
        return Err(CacheError::KeyMismatch {
            found: found.to_string(),
            expected: key.to_string(),
        });
    }

    Ok(envelope)
}

/// Hash a document id into a short directory-safe name (first 16 hex chars of SHA256)
pub fn hash_document_id(document_id: &DocumentId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_str().as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// File-backed cache: `{root}/{hash(documentId)}/{stage}.v{version}.json`
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every entry of a document
    pub fn document_dir(&self, document_id: &DocumentId) -> PathBuf {
        self.root.join(hash_document_id(document_id))
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.document_dir(&key.document_id)
            .join(format!("{}.v{}.json", key.stage, key.schema_version))
    }

    /// Delete every entry of a document, whatever its schema version
    pub async fn remove_document(&self, document_id: &DocumentId) -> Result<(), CacheError> {
        match fs::remove_dir_all(self.document_dir(document_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DurableCache for FileCache {
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let dir = self.document_dir(&key.document_id);
        fs::create_dir_all(&dir).await?;

        // Write to a temp file in the same directory, then rename over the
        // target so readers never observe a half-written entry.
        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            let mut file = tempfile::NamedTempFile::new_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            file.persist(&path)
                .map_err(|e| CacheError::Persist(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Persist(e.to_string()))?
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local cache, for tests and embedding without a disk
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&key.to_string())
    }
}

#[async_trait]
impl DurableCache for MemoryCache {
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key.to_string())
            .cloned())
    }

    async fn write(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key.to_string());
        Ok(())
    }
}

/// Error-swallowing facade over a `DurableCache`
#[derive(Clone)]
pub struct StageCache {
    backend: Arc<dyn DurableCache>,
    schema_version: u32,
}

impl StageCache {
    pub fn new(backend: Arc<dyn DurableCache>) -> Self {
        Self::with_schema_version(backend, SCHEMA_VERSION)
    }

    pub fn with_schema_version(backend: Arc<dyn DurableCache>, schema_version: u32) -> Self {
        Self {
            backend,
            schema_version,
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn key(&self, document_id: &DocumentId, stage: Stage) -> CacheKey {
        CacheKey::new(document_id.clone(), stage, self.schema_version)
    }

    /// Cached entry for a stage; any failure reads as a miss
    pub async fn read(&self, document_id: &DocumentId, stage: Stage) -> Option<CacheEnvelope> {
        let key = self.key(document_id, stage);

        let bytes = match self.backend.read(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(%key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match decode_entry(&key, &bytes) {
            Ok(envelope) => Some(envelope),
            Err(CacheError::VersionMismatch { found, expected }) => {
                debug!(%key, found, expected, "Ignoring cache entry from another schema version");
                None
            }
            Err(e) => {
                warn!(%key, error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Persist a payload; returns whether the write succeeded
    pub async fn write(&self, document_id: &DocumentId, stage: Stage, payload: &StagePayload) -> bool {
        let key = self.key(document_id, stage);

        let result = match encode_entry(&key, payload) {
            Ok(bytes) => self.backend.write(&key, bytes).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                debug!(%key, "Cached stage payload");
                true
            }
            Err(e) => {
                warn!(%key, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Delete the entries of the given stages
    pub async fn invalidate(&self, document_id: &DocumentId, stages: &[Stage]) {
        for stage in stages {
            let key = self.key(document_id, *stage);
            if let Err(e) = self.backend.remove(&key).await {
                warn!(%key, error = %e, "Cache invalidation failed");
            }
        }
    }
}
