use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug)]
pub struct Config {
    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,
    /// root directory for encrypted artifact objects, if not set
    ///  then an in-memory store will be used
    pub store_root: Option<PathBuf>,

    // crypto configuration
    /// on system file path to the 32-byte master key,
    ///  if not set then an ephemeral key will be generated
    pub master_key_path: Option<PathBuf>,

    // background work
    /// how often the expiry reaper sweeps
    pub sweep_interval: Duration,
    /// TTL for cached location lookups
    pub location_cache_ttl: Duration,

    // misc
    pub log_level: tracing::Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            store_root: None,
            master_key_path: None,
            sweep_interval: Duration::from_secs(24 * 60 * 60),
            location_cache_ttl: Duration::from_secs(60 * 60),
            log_level: tracing::Level::INFO,
        }
    }
}
