//! Standalone discovery device creation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chainforge_core::{DeviceId, ProvisionError};
use chainforge_tools::DeviceIdGenerator;
use serde::Serialize;
use tracing::info;

use crate::error::OpsError;
use crate::layout::{DISCOVERY_CONFIG_FILE, ensure_dir};

/// Scratch directory the discovery tool initializes before the id is known.
pub const DEVICE_STAGING_DIR: &str = ".device-staging";

/// A created discovery device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub device_id: DeviceId,
    /// `<work_dir>/<device_id>`, holding the device key and certificate.
    pub dir: PathBuf,
}

/// Initialize one discovery device and move its home to
/// `<work_dir>/<device_id>`.
///
/// The generated `config.xml` is removed: cluster runs render their own.
pub fn create_device<G: DeviceIdGenerator + ?Sized>(
    generator: &G,
    work_dir: &Path,
) -> Result<DeviceSummary, OpsError> {
    let staging = work_dir.join(DEVICE_STAGING_DIR);
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .map_err(OpsError::io("failed to clear staging directory", &staging))?;
    }
    ensure_dir(&staging)?;

    let device_id = generator.generate_device_id(&staging)?;

    let dir = work_dir.join(device_id.as_str());
    if dir.exists() {
        return Err(ProvisionError::Configuration(format!(
            "device directory {} already exists",
            dir.display()
        ))
        .into());
    }
    fs::rename(&staging, &dir).map_err(OpsError::io("failed to move device to", &dir))?;

    let config = dir.join(DISCOVERY_CONFIG_FILE);
    match fs::remove_file(&config) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(OpsError::io("failed to remove", &config)(e)),
    }

    info!(device_id = %device_id, dir = %dir.display(), "device created");
    Ok(DeviceSummary { device_id, dir })
}
