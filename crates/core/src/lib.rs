//! Core components of the strongroom vault engine.
//!
//! Everything here is a leaf: the encrypted container codec, the master
//! key and password primitives, the pure access policy evaluator, and
//! the domain types shared with the service layer. No module in this
//! crate performs database or storage I/O.

pub mod crypto;
pub mod error;
pub mod policy;
pub mod types;

pub use error::DenyReason;
pub use policy::{evaluate, Verdict};
pub use types::{
    AccessLogEntry, AccessMethod, AccessPolicy, Artifact, Outcome, RequestContext,
};
