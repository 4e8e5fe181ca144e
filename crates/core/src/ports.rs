//! External port allocation.
//!
//! A co-located cluster exposes a single port, the ledger RPC endpoint, shared
//! by every node behind one selector. A federated cluster gives each node its
//! own block of external ports starting at the node's base port `P`:
//!
//! | offset | port            |
//! |--------|-----------------|
//! | +0     | ledger network  |
//! | +1     | discovery       |
//! | +2     | ledger RPC      |
//! | +3     | monitor-process |
//! | +4     | monitor-exporter|
//! | +5     | executor call   |
//! | +6     | chaincode       |
//! | +7     | event hub       |
//!
//! Only the ports a run actually needs are exposed, but the offsets are fixed.
//! Two nodes' base ports must differ by more than the largest offset in use.

use serde::Serialize;

use crate::catalog::ExecutorKind;
use crate::constants::PortCatalog;
use crate::error::ProvisionError;
use crate::topology::NodeIndex;

/// A port exposed outside the cluster in federated mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposedPort {
    Network,
    Discovery,
    Rpc,
    MonitorProcess,
    MonitorExporter,
    ExecutorCall,
    Chaincode,
    Eventhub,
}

impl ExposedPort {
    pub const ALL: [ExposedPort; 8] = [
        ExposedPort::Network,
        ExposedPort::Discovery,
        ExposedPort::Rpc,
        ExposedPort::MonitorProcess,
        ExposedPort::MonitorExporter,
        ExposedPort::ExecutorCall,
        ExposedPort::Chaincode,
        ExposedPort::Eventhub,
    ];

    /// Offset from the node's base port.
    pub fn offset(self) -> u16 {
        match self {
            Self::Network => 0,
            Self::Discovery => 1,
            Self::Rpc => 2,
            Self::MonitorProcess => 3,
            Self::MonitorExporter => 4,
            Self::ExecutorCall => 5,
            Self::Chaincode => 6,
            Self::Eventhub => 7,
        }
    }

    /// Service port name (at most 15 characters, as Kubernetes requires).
    pub fn port_name(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Discovery => "discovery",
            Self::Rpc => "rpc",
            Self::MonitorProcess => "mon-process",
            Self::MonitorExporter => "mon-exporter",
            Self::ExecutorCall => "executor-call",
            Self::Chaincode => "chaincode",
            Self::Eventhub => "eventhub",
        }
    }

    /// In-container port the external port forwards to.
    pub fn target_port(self, ports: &PortCatalog) -> u16 {
        match self {
            Self::Network => ports.ledger_network,
            Self::Discovery => ports.discovery,
            Self::Rpc => ports.controller,
            Self::MonitorProcess => ports.monitor_process,
            Self::MonitorExporter => ports.monitor_exporter,
            Self::ExecutorCall => ports.executor,
            Self::Chaincode => ports.chaincode,
            Self::Eventhub => ports.eventhub,
        }
    }
}

/// Which optional ports a run exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureProfile {
    /// Monitoring sidecars are deployed.
    pub monitoring: bool,
    /// Executor flavour declared by the catalog.
    pub executor: ExecutorKind,
}

impl ExposureProfile {
    /// Ports exposed per node, in offset order.
    pub fn exposed_ports(&self) -> Vec<ExposedPort> {
        ExposedPort::ALL
            .into_iter()
            .filter(|port| match port {
                ExposedPort::Network
                | ExposedPort::Discovery
                | ExposedPort::Rpc
                | ExposedPort::ExecutorCall => true,
                ExposedPort::MonitorProcess | ExposedPort::MonitorExporter => self.monitoring,
                ExposedPort::Chaincode | ExposedPort::Eventhub => self.executor.has_chaincode(),
            })
            .collect()
    }

    /// Largest offset in use.
    pub fn max_offset(&self) -> u16 {
        self.exposed_ports()
            .iter()
            .map(|p| p.offset())
            .max()
            .unwrap_or(0)
    }
}

/// One external port of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocatedPort {
    pub kind: ExposedPort,
    /// Externally reachable port.
    pub external: u16,
    /// In-container port it forwards to.
    pub target: u16,
}

/// The external ports of one node in federated mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBlock {
    pub node: NodeIndex,
    pub base: u16,
    pub ports: Vec<AllocatedPort>,
}

impl PortBlock {
    /// External port of `kind`, if this block exposes it.
    pub fn external(&self, kind: ExposedPort) -> Option<u16> {
        self.ports
            .iter()
            .find(|p| p.kind == kind)
            .map(|p| p.external)
    }
}

/// Derives external ports for every node of a cluster.
#[derive(Debug, Clone)]
pub struct PortAllocator<'a> {
    catalog: &'a PortCatalog,
    profile: ExposureProfile,
}

impl<'a> PortAllocator<'a> {
    pub fn new(catalog: &'a PortCatalog, profile: ExposureProfile) -> Self {
        Self { catalog, profile }
    }

    /// The single port a co-located cluster exposes.
    pub fn shared_rpc_port(&self) -> u16 {
        self.catalog.controller
    }

    /// Discovery port of a federated node with base port `base`.
    pub fn discovery_port(base: u16) -> u16 {
        base.saturating_add(ExposedPort::Discovery.offset())
    }

    /// Allocate one port block per supplied base port.
    ///
    /// Fails if a block would run past `u16::MAX` or if two nodes' base ports
    /// are not separated by more than the largest offset in use. The first
    /// offending pair in index order is reported.
    pub fn allocate(&self, base_ports: &[u16]) -> Result<Vec<PortBlock>, ProvisionError> {
        let max_offset = self.profile.max_offset();

        for (i, base) in base_ports.iter().enumerate() {
            if base.checked_add(max_offset).is_none() {
                return Err(ProvisionError::Configuration(format!(
                    "base port {base} of node {i} leaves no room for {max_offset} further ports"
                )));
            }
        }

        for (i, first) in base_ports.iter().enumerate() {
            for (j, second) in base_ports.iter().enumerate().skip(i + 1) {
                if first.abs_diff(*second) <= max_offset {
                    return Err(ProvisionError::PortCollision {
                        first: NodeIndex::new(i),
                        first_port: *first,
                        second: NodeIndex::new(j),
                        second_port: *second,
                        max_offset,
                    });
                }
            }
        }

        let exposed = self.profile.exposed_ports();
        Ok(base_ports
            .iter()
            .enumerate()
            .map(|(i, base)| PortBlock {
                node: NodeIndex::new(i),
                base: *base,
                ports: exposed
                    .iter()
                    .map(|kind| AllocatedPort {
                        kind: *kind,
                        external: base + kind.offset(),
                        target: kind.target_port(self.catalog),
                    })
                    .collect(),
            })
            .collect())
    }
}
