//! Error types for manifest assembly.

use chainforge_core::ProvisionError;
use thiserror::Error;

/// Errors raised while assembling or serializing manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The cluster description is inconsistent (arity, ports).
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// A resource could not be written or read as YAML.
    #[error("manifest yaml error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// The operating system random source failed.
    #[error("failed to gather randomness for {purpose}: {detail}")]
    Entropy {
        purpose: &'static str,
        detail: String,
    },
}
