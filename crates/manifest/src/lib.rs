//! Deployment manifests for chainforge clusters.
//!
//! [`ManifestAssembler`] turns a validated catalog and the run's topology into
//! an ordered list of [`ManifestResource`]s: per-node secrets, services and
//! pods, plus the shared RPC service of a co-located cluster or the per-node
//! load balancers of a federated one. [`storage`] builds the volume documents
//! the data claims bind to, and [`to_yaml_stream`] renders any resource list
//! as a multi-document YAML stream.

pub mod assembler;
pub mod error;
pub mod pod;
pub mod resource;
pub mod secrets;
pub mod storage;
pub mod writer;

pub use assembler::{
    ClusterLayout, DEFAULT_LB_ANNOTATION, ManifestAssembler, MultiLayout, load_balancer_name,
    shared_rpc_service_name,
};
pub use error::ManifestError;
pub use pod::{CHAIN_NAME_LABEL, CHAIN_NODE_LABEL, PodBuilder, SidecarImages, node_labels};
pub use resource::ManifestResource;
pub use secrets::NetworkKey;
pub use storage::{LOCAL_PVC_NAME, NFS_PVC_NAME, local_storage, nfs_storage};
pub use writer::{from_yaml_stream, to_yaml_stream};
