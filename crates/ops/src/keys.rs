//! Key material orchestration.
//!
//! The key-generation tool reads its passphrase from a file in the directory
//! it runs in. The file only exists for the duration of one invocation and
//! is removed whether or not the invocation succeeds.

use std::fs;
use std::path::{Path, PathBuf};

use chainforge_core::KeyMaterial;
use chainforge_tools::{IdentityGenerator, PASSPHRASE_FILE};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::error::OpsError;
use crate::layout::{KEY_ID_FILE, NODE_ADDRESS_FILE, ensure_dir, write_file};

/// Passphrase file that deletes itself when dropped.
struct PassphraseFile {
    path: PathBuf,
}

impl PassphraseFile {
    fn create(scope: &Path, password: &SecretString) -> Result<Self, OpsError> {
        let path = scope.join(PASSPHRASE_FILE);
        fs::write(&path, password.expose_secret())
            .map_err(OpsError::io("failed to write passphrase file", &path))?;
        Ok(Self { path })
    }
}

impl Drop for PassphraseFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove passphrase file");
        }
    }
}

/// Sequences identity requests against one generator.
#[derive(Debug)]
pub struct KeyOrchestrator<'a, G: IdentityGenerator + ?Sized> {
    generator: &'a G,
}

impl<'a, G: IdentityGenerator + ?Sized> KeyOrchestrator<'a, G> {
    pub fn new(generator: &'a G) -> Self {
        Self { generator }
    }

    /// Generate one identity in `scope` and persist its `key_id` and
    /// `node_address` next to the key database.
    pub fn generate(&self, scope: &Path, password: &SecretString) -> Result<KeyMaterial, OpsError> {
        ensure_dir(scope)?;
        let key = {
            let _passphrase = PassphraseFile::create(scope, password)?;
            self.generator.generate_identity(scope)?
        };
        write_file(&scope.join(KEY_ID_FILE), key.key_id.to_string())?;
        write_file(&scope.join(NODE_ADDRESS_FILE), &key.address)?;
        info!(scope = %scope.display(), address = %key.address, "identity persisted");
        Ok(key)
    }

    /// Generate the chain admin identity, then one identity per node.
    ///
    /// Node identities are returned in the order of `nodes`.
    pub fn generate_cluster(
        &self,
        admin: (&Path, &SecretString),
        nodes: &[(PathBuf, &SecretString)],
    ) -> Result<ClusterKeys, OpsError> {
        let admin = self.generate(admin.0, admin.1)?;
        let nodes = nodes
            .iter()
            .map(|(scope, password)| self.generate(scope, password))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ClusterKeys { admin, nodes })
    }
}

/// Every identity of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterKeys {
    pub admin: KeyMaterial,
    /// In node-index order.
    pub nodes: Vec<KeyMaterial>,
}
