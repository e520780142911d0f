//! The artifact store: the only component that touches encrypted bytes.
//!
//! Backed by the `object_store` abstraction — local filesystem in the
//! reference deployment, in-memory for tests — so the contract stays
//! storage-agnostic. Plaintext goes in, is encrypted through the
//! container codec on the way down, and only ciphertext ever reaches
//! the backend.

use std::path::PathBuf;
use std::sync::Arc;

use object_store::buffered::{BufReader, BufWriter};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

use strongroom_core::crypto::{encrypt_stream, VaultKey};

use crate::error::{Result, VaultError};

/// Configuration for the artifact storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },
}

/// Encrypted artifact storage.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    inner: Arc<dyn ObjectStore>,
    key: VaultKey,
}

impl ArtifactStore {
    /// Create a new store from configuration.
    pub async fn new(config: StoreConfig, key: VaultKey) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            StoreConfig::Memory => Arc::new(InMemory::new()),
            StoreConfig::Local { path } => {
                // Ensure directory exists
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(VaultError::Storage)?,
                )
            }
        };
        Ok(Self { inner, key })
    }

    /// The storage locator an artifact id maps to.
    pub fn locator_for(id: &Uuid) -> String {
        format!("artifacts/{}", id)
    }

    /// Encrypt a plaintext stream and persist it under the given id.
    ///
    /// Returns the locator and the plaintext size. On any failure the
    /// partially written object is removed before the error propagates,
    /// so no dangling partial artifacts remain.
    pub async fn put<R>(&self, id: &Uuid, reader: R) -> Result<(String, u64)>
    where
        R: AsyncRead + Unpin,
    {
        let locator = Self::locator_for(id);
        let path = ObjectPath::from(locator.clone());
        let mut writer = BufWriter::new(self.inner.clone(), path.clone());

        match encrypt_stream(&self.key, reader, &mut writer).await {
            Ok(size) => {
                if let Err(e) = writer.shutdown().await {
                    let _ = self.inner.delete(&path).await;
                    return Err(e.into());
                }
                tracing::debug!(locator = %locator, size, "artifact bytes stored");
                Ok((locator, size))
            }
            Err(e) => {
                let _ = writer.abort().await;
                let _ = self.inner.delete(&path).await;
                Err(e.into())
            }
        }
    }

    /// Open the ciphertext stream behind a locator.
    ///
    /// Fails with the backend's not-found error when the locator does
    /// not resolve to an existing object.
    pub async fn open_for_read(&self, locator: &str) -> Result<BufReader> {
        let path = ObjectPath::from(locator);
        let meta = self.inner.head(&path).await?;
        Ok(BufReader::new(self.inner.clone(), &meta))
    }

    /// Delete the object behind a locator. Idempotent: absence of the
    /// underlying object is not an error.
    pub async fn delete(&self, locator: &str) -> Result<()> {
        let path = ObjectPath::from(locator);
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// The key under which containers are encrypted.
    pub(crate) fn key(&self) -> &VaultKey {
        &self.key
    }
}
