//! Key-generation collaborator contract.
//!
//! The collaborator runs inside a scope directory that already contains the
//! passphrase file [`PASSPHRASE_FILE`]. Its last non-empty output line reads
//! `key_id:<integer>,address:0x<40 hex chars>`.

use std::path::Path;
use std::sync::LazyLock;

use chainforge_core::{KeyMaterial, ProvisionError};
use regex::Regex;

use crate::error::ToolError;

/// Name of the passphrase file the collaborator reads.
pub const PASSPHRASE_FILE: &str = "key_file";

static IDENTITY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^key_id:(\d+),address:(0x[0-9a-fA-F]{40})$").expect("identity regex is valid")
});

/// Produces one identity per call.
pub trait IdentityGenerator {
    /// Generate an identity scoped to `scope`.
    ///
    /// The caller places the passphrase file in `scope` before the call and
    /// removes it afterwards.
    fn generate_identity(&self, scope: &Path) -> Result<KeyMaterial, ToolError>;
}

/// Parse the collaborator's output.
pub fn parse_identity_output(output: &str) -> Result<KeyMaterial, ProvisionError> {
    let line = output
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| malformed("empty output".to_owned()))?;

    let caps = IDENTITY_LINE.captures(line).ok_or_else(|| {
        malformed(format!(
            "expected `key_id:<id>,address:0x<40 hex>` but got `{line}`"
        ))
    })?;

    let key_id = caps[1]
        .parse::<u64>()
        .map_err(|e| malformed(format!("invalid key id `{}`: {e}", &caps[1])))?;

    Ok(KeyMaterial {
        key_id,
        address: caps[2].to_owned(),
    })
}

fn malformed(detail: String) -> ProvisionError {
    ProvisionError::CollaboratorOutput { tool: "kms", detail }
}
