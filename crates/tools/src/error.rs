use std::path::PathBuf;

use chainforge_core::ProvisionError;
use thiserror::Error;

/// Errors from invoking an external collaborator.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The collaborator process could not be started.
    #[error("failed to run {program} in {}: {source}", dir.display())]
    Spawn {
        program: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The collaborator exited unsuccessfully.
    #[error("{program} exited with {status}: {output}")]
    Exited {
        program: String,
        status: String,
        /// Captured output, trimmed.
        output: String,
    },

    /// The collaborator's output did not match the expected format.
    #[error(transparent)]
    Output(#[from] ProvisionError),
}
