//! Discovery collaborator contract.
//!
//! The collaborator initializes a sync daemon home directory and prints the
//! new device identifier after the literal marker [`DEVICE_ID_MARKER`].

use std::path::Path;

use chainforge_core::{DEVICE_ID_LEN, DeviceId, ProvisionError};

use crate::error::ToolError;

/// Marker preceding the device identifier in the collaborator's output.
pub const DEVICE_ID_MARKER: &str = "Device ID: ";

/// Produces one device identifier per call.
pub trait DeviceIdGenerator {
    /// Initialize `config_dir` and return the identifier of the new device.
    fn generate_device_id(&self, config_dir: &Path) -> Result<DeviceId, ToolError>;
}

/// Extract the device identifier from the collaborator's output.
pub fn parse_device_id(output: &str) -> Result<DeviceId, ProvisionError> {
    let start = output
        .find(DEVICE_ID_MARKER)
        .ok_or_else(|| ProvisionError::CollaboratorOutput {
            tool: "discovery",
            detail: format!("no `{}` marker in output", DEVICE_ID_MARKER.trim_end()),
        })?
        + DEVICE_ID_MARKER.len();

    let token = output
        .get(start..start + DEVICE_ID_LEN)
        .ok_or_else(|| ProvisionError::CollaboratorOutput {
            tool: "discovery",
            detail: format!("device id shorter than {DEVICE_ID_LEN} characters"),
        })?;

    DeviceId::parse(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "MFZWI3D-BONSGYC-YLTMRWG-C43ENR5-QXGZDMM-FZWI3DP-BONSGYY-LTMRWAD";

    #[test]
    fn extracts_token_after_marker() {
        let output = format!(
            "[monitor] INFO: Generating ECDSA key and certificate\n\
             [monitor] INFO: Device ID: {ID}\n\
             [monitor] INFO: Default folder created"
        );
        let id = parse_device_id(&output).unwrap();
        assert_eq!(id.as_str(), ID);
    }

    #[test]
    fn token_at_end_of_output() {
        let id = parse_device_id(&format!("Device ID: {ID}")).unwrap();
        assert_eq!(id.as_str().len(), DEVICE_ID_LEN);
    }

    #[test]
    fn missing_marker_is_rejected() {
        let err = parse_device_id("generated key").unwrap_err();
        assert!(err.to_string().contains("marker"));
    }

    #[test]
    fn truncated_token_is_rejected() {
        let err = parse_device_id(&format!("Device ID: {}", &ID[..40])).unwrap_err();
        assert!(err.to_string().contains("shorter"));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let bad = ID.to_lowercase();
        assert!(parse_device_id(&format!("Device ID: {bad}")).is_err());
    }
}
