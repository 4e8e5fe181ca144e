//! Generation runs for chainforge.
//!
//! [`Provisioner::run`] drives a whole cluster generation: it validates the
//! request, writes per-node configuration artifacts, sequences the key and
//! discovery collaborators, and finally writes the deployment manifest.
//! [`create_account`], [`create_device`] and the storage writers back the
//! smaller CLI subcommands.

mod account;
mod config;
mod device;
mod error;
mod keys;
mod layout;
mod provision;
mod request;
mod storage;

pub use account::{ACCOUNT_STAGING_DIR, AccountSummary, create_account};
pub use config::{ForgeConfig, LoadBalancerConfig, ToolsConfig};
pub use device::{DEVICE_STAGING_DIR, DeviceSummary, create_device};
pub use error::OpsError;
pub use keys::{ClusterKeys, KeyOrchestrator};
pub use layout::{
    CONSENSUS_CONFIG_FILE, CONTROLLER_CONFIG_FILE, ChainLayout, DISCOVERY_CONFIG_DIR,
    DISCOVERY_CONFIG_FILE, GENESIS_FILE, KEY_ID_FILE, NETWORK_CONFIG_FILE, NODE_ADDRESS_FILE,
    SYS_CONFIG_FILE,
};
pub use provision::{Provisioner, RunSummary};
pub use request::{
    ClusterRequest, LocalRequest, MAX_CHAIN_NAME_LEN, MultiRequest, TopologyRequest,
    validate_chain_name,
};
pub use storage::{LOCAL_STORAGE_FILE, NFS_STORAGE_FILE, write_local_storage, write_nfs_storage};

/// Re-export the model and collaborator crates for consumers.
pub use chainforge_core;
pub use chainforge_manifest;
pub use chainforge_tools;
