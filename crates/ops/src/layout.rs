//! On-disk layout of a generation run.
//!
//! ```text
//! <work_dir>/
//!     <chain>.yaml
//!     <chain>/
//!         admin/            key_id, node_address
//!         node<i>/          config artifacts, key_id, node_address
//!             config/       discovery daemon state, config.xml
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chainforge_core::NodeIndex;

use crate::error::OpsError;

pub const NETWORK_CONFIG_FILE: &str = "network-config.toml";
pub const CONSENSUS_CONFIG_FILE: &str = "consensus-config.toml";
pub const CONTROLLER_CONFIG_FILE: &str = "controller-config.toml";
pub const GENESIS_FILE: &str = "genesis.toml";
pub const SYS_CONFIG_FILE: &str = "init_sys_config.toml";
pub const KEY_ID_FILE: &str = "key_id";
pub const NODE_ADDRESS_FILE: &str = "node_address";
pub const DISCOVERY_CONFIG_DIR: &str = "config";
pub const DISCOVERY_CONFIG_FILE: &str = "config.xml";

/// Paths of one chain inside a working directory.
#[derive(Debug, Clone)]
pub struct ChainLayout {
    work_dir: PathBuf,
    chain_name: String,
}

impl ChainLayout {
    pub fn new(work_dir: impl Into<PathBuf>, chain_name: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            chain_name: chain_name.into(),
        }
    }

    pub fn chain_dir(&self) -> PathBuf {
        self.work_dir.join(&self.chain_name)
    }

    pub fn admin_dir(&self) -> PathBuf {
        self.chain_dir().join("admin")
    }

    pub fn node_dir(&self, node: NodeIndex) -> PathBuf {
        self.chain_dir().join(format!("node{node}"))
    }

    pub fn discovery_dir(&self, node: NodeIndex) -> PathBuf {
        self.node_dir(node).join(DISCOVERY_CONFIG_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.yaml", self.chain_name))
    }

    /// Resolve a user-supplied path against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }
}

/// Create `dir` and its parents.
pub fn ensure_dir(dir: &Path) -> Result<(), OpsError> {
    fs::create_dir_all(dir).map_err(OpsError::io("failed to create directory", dir))
}

/// Write `contents` to `path`, replacing any previous file.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), OpsError> {
    fs::write(path, contents).map_err(OpsError::io("failed to write", path))?;
    tracing::debug!(path = %path.display(), "artifact written");
    Ok(())
}
