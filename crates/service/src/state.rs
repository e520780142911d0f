use std::sync::Arc;
use std::time::Duration;

use strongroom_core::crypto::VaultKey;

use crate::audit::AuditLog;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::database::Database;
use crate::error::VaultError;
use crate::reaper::ExpiryReaper;
use crate::store::{ArtifactStore, StoreConfig};
use crate::vault::Vault;

/// Main service state - wires database, artifact store, master key,
/// audit log, and the location cache into one engine.
#[derive(Clone)]
pub struct State {
    vault: Vault,
    reaper: ExpiryReaper,
    location_cache: Arc<TtlCache<String, String>>,
    sweep_interval: Duration,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Setup database
        let database = match &config.sqlite_path {
            Some(path) => Database::new(path).await?,
            None => {
                tracing::warn!("no sqlite path configured, using in-memory database");
                Database::in_memory().await?
            }
        };

        // 2. Setup master key
        let key = match &config.master_key_path {
            Some(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|_| StateSetupError::MasterKeyUnreadable)?;
                VaultKey::from_slice(&bytes).map_err(|_| StateSetupError::InvalidMasterKey)?
            }
            None => {
                tracing::warn!("no master key path configured, generating an ephemeral key");
                VaultKey::generate()
            }
        };

        // 3. Setup artifact store
        let store_config = match &config.store_root {
            Some(path) => StoreConfig::Local { path: path.clone() },
            None => {
                tracing::warn!("no store root configured, using in-memory object store");
                StoreConfig::Memory
            }
        };
        let store = ArtifactStore::new(store_config, key).await?;

        // 4. Assemble the engine
        let audit = AuditLog::new(database.clone());
        let vault = Vault::new(database.clone(), store.clone(), audit);
        let reaper = ExpiryReaper::new(database, store);
        let location_cache = Arc::new(TtlCache::new(config.location_cache_ttl));

        Ok(Self {
            vault,
            reaper,
            location_cache,
            sweep_interval: config.sweep_interval,
        })
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn audit(&self) -> &AuditLog {
        self.vault.audit()
    }

    pub fn reaper(&self) -> &ExpiryReaper {
        &self.reaper
    }

    pub fn location_cache(&self) -> &Arc<TtlCache<String, String>> {
        &self.location_cache
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("vault setup error: {0}")]
    Vault(#[from] VaultError),
    #[error("master key file could not be read")]
    MasterKeyUnreadable,
    #[error("master key file does not hold a valid 32-byte key")]
    InvalidMasterKey,
}
