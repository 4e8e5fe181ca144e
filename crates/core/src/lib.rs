//! Cluster model and topology synthesis for chainforge.
//!
//! Everything in this crate is pure: catalog validation, peer mesh
//! construction, port allocation, configuration artifacts and discovery mesh
//! rendering. Side effects (collaborator processes, the filesystem) live in
//! `chainforge-tools` and `chainforge-ops`.

pub mod artifacts;
pub mod catalog;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod ports;
pub mod topology;

pub use artifacts::{
    ConsensusConfig, ControllerConfig, GenesisConfig, KeyMaterial, SysConfig, to_toml,
};
pub use catalog::{
    COMPLETE_FINGERPRINT, CatalogFile, ExecutorKind, ServiceCatalog, ServiceEntry, ServiceRole,
    ServiceSpec, catalog_fingerprint,
};
pub use constants::{LOG_CONFIG_TEMPLATE, PortCatalog, ProvisionConstants};
pub use discovery::{
    DEVICE_ID_LEN, DeviceId, DiscoveryMesh, DiscoveryPeer, DiscoveryTemplate, Transport,
};
pub use error::ProvisionError;
pub use ports::{AllocatedPort, ExposedPort, ExposureProfile, PortAllocator, PortBlock};
pub use topology::{
    AddressSource, ClusterMode, ExternalAddresses, NetworkConfig, NodeIndex, PeerAddress,
    SynthesizedAddresses, build_network_configs, node_host_name,
};
