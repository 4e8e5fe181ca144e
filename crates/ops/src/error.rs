//! Error types for the operations layer.

use std::path::PathBuf;

use chainforge_core::ProvisionError;
use chainforge_manifest::ManifestError;
use chainforge_tools::ToolError;
use thiserror::Error;

/// Errors from a generation run.
#[derive(Debug, Error)]
pub enum OpsError {
    /// The cluster description violates an invariant.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// An external collaborator failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The manifest could not be assembled or rendered.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A configuration file could not be read or parsed.
    #[error("invalid configuration file {path}: {detail}")]
    ConfigFile { path: PathBuf, detail: String },

    /// Filesystem error on an artifact path.
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OpsError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }
}
