//! Standalone account creation.

use std::fs;
use std::path::{Path, PathBuf};

use chainforge_core::ProvisionError;
use chainforge_tools::IdentityGenerator;
use secrecy::SecretString;
use serde::Serialize;
use tracing::info;

use crate::error::OpsError;
use crate::keys::KeyOrchestrator;

/// Scratch directory the key tool runs in before the address is known.
pub const ACCOUNT_STAGING_DIR: &str = ".account-staging";

/// A created account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub key_id: u64,
    pub address: String,
    /// `<work_dir>/<address>`, holding the key database, `key_id` and
    /// `node_address`.
    pub dir: PathBuf,
}

/// Generate one identity and move it to `<work_dir>/<address>`.
pub fn create_account<G: IdentityGenerator + ?Sized>(
    generator: &G,
    work_dir: &Path,
    password: &SecretString,
) -> Result<AccountSummary, OpsError> {
    let staging = work_dir.join(ACCOUNT_STAGING_DIR);
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .map_err(OpsError::io("failed to clear staging directory", &staging))?;
    }

    let key = KeyOrchestrator::new(generator).generate(&staging, password)?;

    let dir = work_dir.join(&key.address);
    if dir.exists() {
        return Err(ProvisionError::Configuration(format!(
            "account directory {} already exists",
            dir.display()
        ))
        .into());
    }
    fs::rename(&staging, &dir).map_err(OpsError::io("failed to move account to", &dir))?;

    info!(key_id = key.key_id, address = %key.address, "account created");
    Ok(AccountSummary {
        key_id: key.key_id,
        address: key.address,
        dir,
    })
}
