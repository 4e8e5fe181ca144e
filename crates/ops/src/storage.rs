//! Storage manifests the cluster data claims bind to.

use std::path::{Path, PathBuf};

use chainforge_core::ProvisionError;
use chainforge_manifest::{local_storage, nfs_storage, to_yaml_stream};
use tracing::info;

use crate::error::OpsError;
use crate::layout::write_file;

pub const LOCAL_STORAGE_FILE: &str = "local-pvc.yaml";
pub const NFS_STORAGE_FILE: &str = "nfs-pvc.yaml";

/// Write `local-pvc.yaml`: a host-path volume on `node_hostnames`.
pub fn write_local_storage(
    work_dir: &Path,
    data_dir: &str,
    node_hostnames: &[String],
) -> Result<PathBuf, OpsError> {
    if node_hostnames.is_empty() {
        return Err(ProvisionError::Configuration(
            "at least one node host name is required".to_owned(),
        )
        .into());
    }
    let path = work_dir.join(LOCAL_STORAGE_FILE);
    write_file(&path, to_yaml_stream(&local_storage(data_dir, node_hostnames))?)?;
    info!(path = %path.display(), data_dir, "local storage manifest written");
    Ok(path)
}

/// Write `nfs-pvc.yaml`: a volume exported by `server` at `export_path`.
pub fn write_nfs_storage(
    work_dir: &Path,
    server: &str,
    export_path: &str,
) -> Result<PathBuf, OpsError> {
    if server.is_empty() || export_path.is_empty() {
        return Err(ProvisionError::Configuration(
            "nfs server and path are both required".to_owned(),
        )
        .into());
    }
    let path = work_dir.join(NFS_STORAGE_FILE);
    write_file(&path, to_yaml_stream(&nfs_storage(server, export_path))?)?;
    info!(path = %path.display(), server, "nfs storage manifest written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainforge_manifest::{ManifestResource, from_yaml_stream};

    #[test]
    fn local_storage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path =
            write_local_storage(dir.path(), "/srv/data", &["minikube".to_owned()]).unwrap();
        let docs = from_yaml_stream(&std::fs::read_to_string(path).unwrap()).unwrap();
        let kinds: Vec<&str> = docs.iter().map(ManifestResource::kind).collect();
        assert_eq!(
            kinds,
            ["StorageClass", "PersistentVolume", "PersistentVolumeClaim"]
        );
    }

    #[test]
    fn local_storage_needs_hosts() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_local_storage(dir.path(), "/srv/data", &[]).is_err());
        assert!(!dir.path().join(LOCAL_STORAGE_FILE).exists());
    }

    #[test]
    fn nfs_storage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_nfs_storage(dir.path(), "10.1.1.1", "/exports").unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("server: 10.1.1.1"));
        assert!(write_nfs_storage(dir.path(), "", "/exports").is_err());
    }
}
