#![allow(dead_code)]

use strongroom_core::crypto::VaultKey;
use strongroom_core::types::RequestContext;

use strongroom_service::audit::AuditLog;
use strongroom_service::database::Database;
use strongroom_service::store::{ArtifactStore, StoreConfig};
use strongroom_service::vault::{UploadMeta, Vault};

/// A fully in-memory vault for tests.
pub async fn test_vault() -> Vault {
    let db = Database::in_memory().await.unwrap();
    let store = ArtifactStore::new(StoreConfig::Memory, VaultKey::generate())
        .await
        .unwrap();
    let audit = AuditLog::new(db.clone());
    Vault::new(db, store, audit)
}

pub fn meta(name: &str) -> UploadMeta {
    UploadMeta {
        display_name: name.to_string(),
        mime_type: "application/octet-stream".to_string(),
    }
}

pub fn user_ctx(user_id: &str) -> RequestContext {
    RequestContext {
        user_id: Some(user_id.to_string()),
        source_addr: "203.0.113.7".to_string(),
        ..Default::default()
    }
}

pub fn anon_ctx() -> RequestContext {
    RequestContext {
        source_addr: "198.51.100.23".to_string(),
        ..Default::default()
    }
}

pub async fn read_all(file: &mut strongroom_service::RetrievedFile) -> Vec<u8> {
    use tokio::io::AsyncReadExt;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await.unwrap();
    buf
}
