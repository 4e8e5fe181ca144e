//! Backing storage for cluster data volumes.

use std::collections::BTreeMap;

use crate::resource::{
    LocalVolumeSource, ManifestResource, NfsVolumeSource, NodeSelector, NodeSelectorRequirement,
    NodeSelectorTerm, ObjectMeta, PersistentVolume, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeSpec, ResourceRequirements, StorageClass,
    VolumeNodeAffinity,
};

pub const LOCAL_STORAGE_CLASS: &str = "local-storage";
pub const LOCAL_PV_NAME: &str = "local-pv";
pub const LOCAL_PVC_NAME: &str = "local-pvc";
pub const NFS_PV_NAME: &str = "nfs-pv";
pub const NFS_PVC_NAME: &str = "nfs-pvc";

const VOLUME_CAPACITY: &str = "100Gi";
const CLAIM_REQUEST: &str = "10Gi";
const ACCESS_MODE: &str = "ReadWriteMany";
const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// StorageClass, host-path volume pinned to `node_hostnames`, and its claim.
pub fn local_storage(data_dir: &str, node_hostnames: &[String]) -> Vec<ManifestResource> {
    let class = StorageClass {
        api_version: "storage.k8s.io/v1".to_owned(),
        metadata: ObjectMeta::named(LOCAL_STORAGE_CLASS),
        provisioner: "kubernetes.io/no-provisioner".to_owned(),
        volume_binding_mode: "WaitForFirstConsumer".to_owned(),
    };

    let volume = PersistentVolume {
        api_version: "v1".to_owned(),
        metadata: ObjectMeta::named(LOCAL_PV_NAME),
        spec: PersistentVolumeSpec {
            storage_class_name: Some(LOCAL_STORAGE_CLASS.to_owned()),
            local: Some(LocalVolumeSource {
                path: data_dir.to_owned(),
            }),
            node_affinity: Some(VolumeNodeAffinity {
                required: NodeSelector {
                    node_selector_terms: vec![NodeSelectorTerm {
                        match_expressions: vec![NodeSelectorRequirement {
                            key: HOSTNAME_LABEL.to_owned(),
                            operator: "In".to_owned(),
                            values: node_hostnames.to_vec(),
                        }],
                    }],
                },
            }),
            ..volume_spec()
        },
    };

    vec![
        ManifestResource::StorageClass(class),
        ManifestResource::PersistentVolume(volume),
        ManifestResource::PersistentVolumeClaim(claim(
            LOCAL_PVC_NAME,
            Some(LOCAL_STORAGE_CLASS.to_owned()),
        )),
    ]
}

/// NFS-backed volume and its claim.
pub fn nfs_storage(server: &str, path: &str) -> Vec<ManifestResource> {
    let volume = PersistentVolume {
        api_version: "v1".to_owned(),
        metadata: ObjectMeta::named(NFS_PV_NAME),
        spec: PersistentVolumeSpec {
            nfs: Some(NfsVolumeSource {
                server: server.to_owned(),
                path: path.to_owned(),
            }),
            ..volume_spec()
        },
    };

    vec![
        ManifestResource::PersistentVolume(volume),
        ManifestResource::PersistentVolumeClaim(claim(NFS_PVC_NAME, None)),
    ]
}

fn volume_spec() -> PersistentVolumeSpec {
    PersistentVolumeSpec {
        capacity: BTreeMap::from([("storage".to_owned(), VOLUME_CAPACITY.to_owned())]),
        access_modes: vec![ACCESS_MODE.to_owned()],
        persistent_volume_reclaim_policy: "Retain".to_owned(),
        storage_class_name: None,
        local: None,
        nfs: None,
        node_affinity: None,
    }
}

fn claim(name: &str, storage_class_name: Option<String>) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        api_version: "v1".to_owned(),
        metadata: ObjectMeta::named(name),
        spec: PersistentVolumeClaimSpec {
            access_modes: vec![ACCESS_MODE.to_owned()],
            resources: ResourceRequirements {
                requests: BTreeMap::from([("storage".to_owned(), CLAIM_REQUEST.to_owned())]),
            },
            storage_class_name,
        },
    }
}
