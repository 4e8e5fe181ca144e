//! In-memory collaborators for tests and dry runs.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chainforge_core::{DeviceId, KeyMaterial};

use crate::device::DeviceIdGenerator;
use crate::error::ToolError;
use crate::identity::{IdentityGenerator, PASSPHRASE_FILE};

/// Issues sequential identities without running any process.
///
/// Like the real tool, it refuses to run in a scope that has no passphrase
/// file.
#[derive(Debug, Default)]
pub struct MemoryIdentityGenerator {
    scopes: Mutex<Vec<PathBuf>>,
}

impl MemoryIdentityGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes identities were generated in, in call order.
    pub fn scopes(&self) -> Vec<PathBuf> {
        self.scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Address issued by the `n`-th call (1-based).
    pub fn address_for(n: u64) -> String {
        format!("0x{n:040x}")
    }
}

impl IdentityGenerator for MemoryIdentityGenerator {
    fn generate_identity(&self, scope: &Path) -> Result<KeyMaterial, ToolError> {
        if !scope.join(PASSPHRASE_FILE).is_file() {
            return Err(ToolError::Exited {
                program: "memory-kms".to_owned(),
                status: "exit status: 1".to_owned(),
                output: format!("no {PASSPHRASE_FILE} in {}", scope.display()),
            });
        }
        let mut scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        scopes.push(scope.to_path_buf());
        let n = scopes.len() as u64;
        Ok(KeyMaterial {
            key_id: n,
            address: Self::address_for(n),
        })
    }
}

/// Issues sequential, well-formed device identifiers.
#[derive(Debug, Default)]
pub struct MemoryDeviceIdGenerator {
    dirs: Mutex<Vec<PathBuf>>,
}

impl MemoryDeviceIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories device ids were generated for, in call order.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Identifier issued by the `n`-th call (1-based).
    pub fn device_id_for(n: usize) -> DeviceId {
        let groups: Vec<String> = (0..8).map(|g| format!("{:07X}", n * 8 + g)).collect();
        DeviceId::parse(&groups.join("-")).expect("generated device id is well formed")
    }
}

impl DeviceIdGenerator for MemoryDeviceIdGenerator {
    fn generate_device_id(&self, config_dir: &Path) -> Result<DeviceId, ToolError> {
        let mut dirs = self.dirs.lock().unwrap_or_else(PoisonError::into_inner);
        dirs.push(config_dir.to_path_buf());
        Ok(Self::device_id_for(dirs.len()))
    }
}
