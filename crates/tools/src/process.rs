//! Collaborators backed by external processes.
//!
//! Each invocation blocks until the process exits and its output has been
//! captured. The tools print their results on either stream, so stdout is
//! parsed first and stderr is the fallback.

use std::path::Path;
use std::process::Command;

use chainforge_core::{DeviceId, KeyMaterial};
use tracing::{debug, info};

use crate::device::{DeviceIdGenerator, parse_device_id};
use crate::error::ToolError;
use crate::identity::{IdentityGenerator, PASSPHRASE_FILE, parse_identity_output};

/// Placeholder in discovery arguments replaced with the target directory.
pub const DIR_PLACEHOLDER: &str = "{dir}";

/// Runs the key-management binary: `<program> create -k key_file`.
#[derive(Debug, Clone)]
pub struct ProcessIdentityGenerator {
    program: String,
    args: Vec<String>,
}

impl ProcessIdentityGenerator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["create".to_owned(), "-k".to_owned(), PASSPHRASE_FILE.to_owned()],
        }
    }

    /// Replace the default arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl IdentityGenerator for ProcessIdentityGenerator {
    fn generate_identity(&self, scope: &Path) -> Result<KeyMaterial, ToolError> {
        let output = run_captured(&self.program, &self.args, scope)?;
        let key = parse_identity_output(&output.stdout)
            .or_else(|stdout_err| parse_identity_output(&output.stderr).map_err(|_| stdout_err))?;
        info!(
            scope = %scope.display(),
            key_id = key.key_id,
            address = %key.address,
            "identity generated"
        );
        Ok(key)
    }
}

/// Runs the sync daemon in generate mode: `<program> [args..] -generate=<dir>`.
///
/// Leading arguments may contain `{dir}`, which is replaced with the target
/// directory. This allows wrapping the daemon in a container runtime, e.g.
/// `docker run --rm -v {dir}:{dir} syncthing/syncthing:latest`.
#[derive(Debug, Clone)]
pub struct ProcessDeviceIdGenerator {
    program: String,
    leading_args: Vec<String>,
}

impl ProcessDeviceIdGenerator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    fn args_for(&self, config_dir: &Path) -> Vec<String> {
        let dir = config_dir.display().to_string();
        self.leading_args
            .iter()
            .map(|arg| arg.replace(DIR_PLACEHOLDER, &dir))
            .chain(std::iter::once(format!("-generate={dir}")))
            .collect()
    }
}

impl DeviceIdGenerator for ProcessDeviceIdGenerator {
    fn generate_device_id(&self, config_dir: &Path) -> Result<DeviceId, ToolError> {
        let work_dir = config_dir.parent().unwrap_or(config_dir);
        let output = run_captured(&self.program, &self.args_for(config_dir), work_dir)?;
        let device_id = parse_device_id(&output.stdout)
            .or_else(|stdout_err| parse_device_id(&output.stderr).map_err(|_| stdout_err))?;
        info!(
            config_dir = %config_dir.display(),
            device_id = %device_id,
            "discovery device generated"
        );
        Ok(device_id)
    }
}

/// Output of a finished collaborator, one string per stream.
struct Captured {
    stdout: String,
    stderr: String,
}

fn run_captured(program: &str, args: &[String], dir: &Path) -> Result<Captured, ToolError> {
    debug!(program, ?args, dir = %dir.display(), "running collaborator");

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|source| ToolError::Spawn {
            program: program.to_owned(),
            dir: dir.to_path_buf(),
            source,
        })?;

    let captured = Captured {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !output.status.success() {
        let combined = format!("{}\n{}", captured.stdout.trim(), captured.stderr.trim());
        return Err(ToolError::Exited {
            program: program.to_owned(),
            status: output.status.to_string(),
            output: combined.trim().to_owned(),
        });
    }
    Ok(captured)
}
