//! Hot-reloadable ranking configuration
//!
//! Requests take an immutable [`Arc`] snapshot of the config and keep it for
//! their whole duration. A reload parses and validates the file first and only
//! then swaps the handle; a bad file leaves the current config in place.

use jobrank_core::{RankingConfig, Result};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<RankingConfig>>,
}

impl ConfigStore {
    /// Load and validate the config at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let config = read_config(&path)?;
        info!("Loaded ranking config from {:?}", path);
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(config)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The config in effect right now. Never changes under the caller.
    pub fn snapshot(&self) -> Arc<RankingConfig> {
        self.current.read().clone()
    }

    /// Re-read the file and swap it in if it validates.
    pub fn reload(&self) -> Result<Arc<RankingConfig>> {
        match read_config(&self.path) {
            Ok(config) => {
                let config = Arc::new(config);
                *self.current.write() = config.clone();
                info!("Reloaded ranking config from {:?}", self.path);
                Ok(config)
            }
            Err(e) => {
                warn!("Config reload failed, keeping previous config: {}", e);
                Err(e)
            }
        }
    }
}

fn read_config(path: &Path) -> Result<RankingConfig> {
    let json = std::fs::read_to_string(path)?;
    RankingConfig::from_json(&json)
}
