//! Fixed values shared by every stage of a generation run.
//!
//! A [`ProvisionConstants`] is built once when the process starts and handed
//! to each component explicitly. Nothing in the crate reads these values from
//! global state.

use crate::catalog::ServiceRole;

/// In-container ports of every service a node runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCatalog {
    /// Ledger peer-to-peer port, referenced by peers in `network-config.toml`.
    pub ledger_network: u16,
    /// gRPC port of the network service.
    pub network: u16,
    /// gRPC port of the consensus service.
    pub consensus: u16,
    /// gRPC port of the executor service.
    pub executor: u16,
    /// gRPC port of the storage service.
    pub storage: u16,
    /// gRPC port of the controller service. Also the ledger RPC endpoint.
    pub controller: u16,
    /// gRPC port of the key-management service.
    pub kms: u16,
    /// Sync protocol port of the discovery sidecar.
    pub discovery: u16,
    /// Web GUI port of the discovery sidecar.
    pub discovery_gui: u16,
    /// Process monitoring exporter.
    pub monitor_process: u16,
    /// Ledger monitoring exporter.
    pub monitor_exporter: u16,
    /// Chaincode listener of chaincode-capable executors.
    pub chaincode: u16,
    /// Event hub of chaincode-capable executors.
    pub eventhub: u16,
    /// External state database used by `ChaincodeWithExternalStateDB` executors.
    pub state_db: u16,
}

impl PortCatalog {
    /// gRPC port a service role listens on.
    pub fn service_port(&self, role: ServiceRole) -> u16 {
        match role {
            ServiceRole::Network => self.network,
            ServiceRole::Consensus => self.consensus,
            ServiceRole::Executor => self.executor,
            ServiceRole::Storage => self.storage,
            ServiceRole::Controller => self.controller,
            ServiceRole::Kms => self.kms,
        }
    }
}

impl Default for PortCatalog {
    fn default() -> Self {
        Self {
            ledger_network: 40000,
            network: 50000,
            consensus: 50001,
            executor: 50002,
            storage: 50003,
            controller: 50004,
            kms: 50005,
            discovery: 22000,
            discovery_gui: 8384,
            monitor_process: 9256,
            monitor_exporter: 9349,
            chaincode: 7052,
            eventhub: 7053,
            state_db: 5984,
        }
    }
}

/// Log configuration written once per service role. `{service}` is replaced
/// with the role name.
pub const LOG_CONFIG_TEMPLATE: &str = r#"# Scan this file for changes every 30 seconds
refresh_rate: 30 seconds

appenders:
  stdout:
    kind: console

  journey-service:
    kind: rolling_file
    path: "logs/{service}-service.log"
    policy:
      kind: compound
      trigger:
        kind: size
        limit: 1mb
      roller:
        kind: fixed_window
        base: 1
        count: 5
        pattern: "logs/{service}-service.{}.gz"

root:
  level: info
  appenders:
    - journey-service
"#;

/// Immutable parameters of a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConstants {
    /// In-container port numbers.
    pub ports: PortCatalog,
    /// Chain identifier written to every node's system config.
    pub chain_id: String,
    /// Previous-hash value of the genesis block.
    pub prevhash: String,
    /// System config schema version.
    pub sysconfig_version: u32,
    /// Folders shared over the discovery mesh. The discovery template must
    /// declare each of them.
    pub sync_folders: Vec<String>,
    /// Template for per-role log configuration files.
    pub log_template: &'static str,
}

impl ProvisionConstants {
    /// Render the log configuration for one service role.
    pub fn log_config(&self, role: ServiceRole) -> String {
        self.log_template.replace("{service}", role.as_str())
    }
}

impl Default for ProvisionConstants {
    fn default() -> Self {
        Self {
            ports: PortCatalog::default(),
            chain_id: format!("0x{:064x}", 1),
            prevhash: format!("0x{:064x}", 0),
            sysconfig_version: 0,
            sync_folders: ["blocks", "proposals", "txs"]
                .iter()
                .map(|f| (*f).to_owned())
                .collect(),
            log_template: LOG_CONFIG_TEMPLATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prevhash_is_zero_padded() {
        let constants = ProvisionConstants::default();
        assert_eq!(constants.prevhash.len(), 66);
        assert!(constants.prevhash.starts_with("0x"));
        assert!(constants.prevhash[2..].chars().all(|c| c == '0'));
    }

    #[test]
    fn chain_id_ends_in_one() {
        let constants = ProvisionConstants::default();
        assert_eq!(constants.chain_id.len(), 66);
        assert!(constants.chain_id.ends_with("01"));
    }

    #[test]
    fn service_ports_are_distinct() {
        let ports = PortCatalog::default();
        let mut seen: Vec<u16> = ServiceRole::ALL
            .iter()
            .map(|r| ports.service_port(*r))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), ServiceRole::ALL.len());
    }

    #[test]
    fn log_config_names_the_service() {
        let constants = ProvisionConstants::default();
        let rendered = constants.log_config(ServiceRole::Consensus);
        assert!(rendered.contains("logs/consensus-service.log"));
        assert!(rendered.contains("logs/consensus-service.{}.gz"));
        assert!(!rendered.contains("{service}"));
    }
}
