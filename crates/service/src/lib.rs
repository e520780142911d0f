//! strongroom-service: the encrypted storage and access-control engine.
//!
//! Uploads are encrypted at rest through the container codec; every
//! retrieval attempt runs through one policy evaluation, is streamed
//! back through a scoped temporary resource, and leaves an immutable
//! audit entry. A periodic reaper removes artifacts whose retention
//! policy has lapsed.

pub mod audit;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod process;
pub mod reaper;
pub mod state;
pub mod store;
pub mod vault;

pub use config::Config;
pub use error::{Result, VaultError};
pub use state::State;
pub use strongroom_core::DenyReason;
pub use vault::{
    ArtifactRef, ArtifactSummary, PolicyChanges, PolicyOptions, PolicySummary, RetrievedFile,
    UploadMeta, Vault,
};
