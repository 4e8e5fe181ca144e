//! Per-node configuration artifacts written as TOML.

use serde::{Deserialize, Serialize};

use crate::constants::{PortCatalog, ProvisionConstants};
use crate::error::ProvisionError;
use crate::topology::NodeIndex;

/// Identity produced by the key-generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub key_id: u64,
    /// `0x`-prefixed account address.
    pub address: String,
}

/// Serialize any artifact to TOML.
pub fn to_toml<T: Serialize>(artifact: &T) -> Result<String, ProvisionError> {
    toml::to_string(artifact).map_err(|e| ProvisionError::Serialization(e.to_string()))
}

/// `genesis.toml`. One value is shared by every node of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub prevhash: String,
}

impl GenesisConfig {
    pub fn new(timestamp: u64, constants: &ProvisionConstants) -> Self {
        Self {
            timestamp,
            prevhash: constants.prevhash.clone(),
        }
    }
}

/// `init_sys_config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysConfig {
    pub version: u32,
    pub chain_id: String,
    pub admin: String,
    /// Seconds between blocks.
    pub block_interval: u32,
    /// Node addresses in node-index order.
    pub validators: Vec<String>,
}

impl SysConfig {
    /// Build the system config once every identity exists.
    pub fn new(
        constants: &ProvisionConstants,
        admin: &KeyMaterial,
        block_interval: u32,
        validators: &[KeyMaterial],
    ) -> Result<Self, ProvisionError> {
        if validators.is_empty() {
            return Err(ProvisionError::Configuration(
                "a chain needs at least one validator".to_owned(),
            ));
        }
        Ok(Self {
            version: constants.sysconfig_version,
            chain_id: constants.chain_id.clone(),
            admin: admin.address.clone(),
            block_interval,
            validators: validators.iter().map(|k| k.address.clone()).collect(),
        })
    }
}

/// `consensus-config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub network_port: u16,
    pub controller_port: u16,
    pub node_id: u64,
}

impl ConsensusConfig {
    pub fn new(ports: &PortCatalog, node: NodeIndex) -> Self {
        Self {
            network_port: ports.network,
            controller_port: ports.controller,
            node_id: node.get() as u64,
        }
    }
}

/// `controller-config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub network_port: u16,
    pub consensus_port: u16,
    pub storage_port: u16,
    pub kms_port: u16,
    pub executor_port: u16,
    pub block_delay_number: u32,
}

impl ControllerConfig {
    pub fn new(ports: &PortCatalog, block_delay_number: u32) -> Self {
        Self {
            network_port: ports.network,
            consensus_port: ports.consensus,
            storage_port: ports.storage,
            kms_port: ports.kms,
            executor_port: ports.executor,
            block_delay_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u64) -> KeyMaterial {
        KeyMaterial {
            key_id: id,
            address: format!("0x{id:040x}"),
        }
    }

    #[test]
    fn genesis_serializes_both_fields() {
        let constants = ProvisionConstants::default();
        let genesis = GenesisConfig::new(1_600_000_000_000, &constants);
        let text = to_toml(&genesis).unwrap();
        assert!(text.contains("timestamp = 1600000000000"));
        assert!(text.contains(&format!("prevhash = \"{}\"", constants.prevhash)));
    }

    #[test]
    fn sysconfig_keeps_validator_order() {
        let constants = ProvisionConstants::default();
        let nodes = [key(2), key(3), key(4)];
        let sys = SysConfig::new(&constants, &key(1), 3, &nodes).unwrap();
        assert_eq!(sys.admin, key(1).address);
        assert_eq!(sys.validators.len(), 3);
        assert_eq!(sys.validators[0], key(2).address);
        assert_eq!(sys.validators[2], key(4).address);
        assert!(!sys.validators.contains(&sys.admin));
    }

    #[test]
    fn sysconfig_requires_validators() {
        let constants = ProvisionConstants::default();
        assert!(SysConfig::new(&constants, &key(1), 3, &[]).is_err());
    }

    #[test]
    fn sysconfig_toml_shape() {
        let constants = ProvisionConstants::default();
        let sys = SysConfig::new(&constants, &key(1), 3, &[key(2)]).unwrap();
        let text = to_toml(&sys).unwrap();
        let back: SysConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, sys);
        assert!(text.contains("version = 0"));
        assert!(text.contains("block_interval = 3"));
    }

    #[test]
    fn service_configs_use_catalog_ports() {
        let ports = PortCatalog::default();
        let consensus = ConsensusConfig::new(&ports, NodeIndex::new(2));
        assert_eq!(consensus.network_port, 50000);
        assert_eq!(consensus.controller_port, 50004);
        assert_eq!(consensus.node_id, 2);

        let controller = ControllerConfig::new(&ports, 6);
        assert_eq!(controller.executor_port, 50002);
        assert_eq!(controller.kms_port, 50005);
        assert_eq!(controller.block_delay_number, 6);
    }
}
