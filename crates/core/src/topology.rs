//! Peer mesh construction.
//!
//! Every node peers with every other node. The addresses peers are reached
//! at come from an [`AddressSource`]: either synthesized from the cluster name
//! (co-located clusters, where each node is a cluster-internal service named
//! `{cluster}-{index}`) or supplied per node by the operator (federated
//! clusters).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// Position of a node inside its cluster, in `[0, N)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    /// Iterate over the indices of an `n`-node cluster.
    pub fn range(n: usize) -> impl Iterator<Item = NodeIndex> {
        (0..n).map(NodeIndex)
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the nodes of a cluster are deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMode {
    /// All nodes in one Kubernetes cluster, sharing storage and one RPC entry point.
    Local,
    /// Nodes addressed independently, each with its own load balancer.
    Multi,
}

impl fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Multi => f.write_str("multi"),
        }
    }
}

/// Cluster-internal host name of a node.
pub fn node_host_name(cluster_name: &str, index: NodeIndex) -> String {
    format!("{cluster_name}-{index}")
}

/// A reachable peer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddress {
    pub ip: String,
    pub port: u16,
}

/// Contents of a node's `network-config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port this node listens on.
    pub port: u16,
    /// Every other node of the cluster, in node-index order.
    pub peers: Vec<PeerAddress>,
}

impl NetworkConfig {
    pub fn to_toml(&self) -> Result<String, ProvisionError> {
        toml::to_string(self).map_err(|e| ProvisionError::Serialization(e.to_string()))
    }

    pub fn from_toml(contents: &str) -> Result<Self, ProvisionError> {
        toml::from_str(contents).map_err(|e| ProvisionError::Serialization(e.to_string()))
    }
}

/// Where peer addresses come from.
pub trait AddressSource {
    /// Number of nodes in the cluster.
    fn node_count(&self) -> usize;

    /// Address other nodes use to reach `index`.
    fn peer_address(&self, index: NodeIndex) -> PeerAddress;
}

/// Addresses derived from the cluster name: `{cluster}-{index}` on a fixed port.
#[derive(Debug, Clone)]
pub struct SynthesizedAddresses {
    cluster_name: String,
    node_count: usize,
    port: u16,
}

impl SynthesizedAddresses {
    pub fn new(cluster_name: impl Into<String>, node_count: usize, port: u16) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            node_count,
            port,
        }
    }
}

impl AddressSource for SynthesizedAddresses {
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn peer_address(&self, index: NodeIndex) -> PeerAddress {
        PeerAddress {
            ip: node_host_name(&self.cluster_name, index),
            port: self.port,
        }
    }
}

/// Operator-supplied `(address, port)` pairs, one per node.
#[derive(Debug, Clone)]
pub struct ExternalAddresses {
    addresses: Vec<PeerAddress>,
}

impl ExternalAddresses {
    /// Pair up hosts and ports. Both lists must have one entry per node.
    pub fn new(hosts: &[String], ports: &[u16]) -> Result<Self, ProvisionError> {
        if hosts.len() != ports.len() {
            return Err(ProvisionError::ArityMismatch {
                field: "node_ports",
                expected: hosts.len(),
                actual: ports.len(),
            });
        }
        let addresses = hosts
            .iter()
            .zip(ports)
            .map(|(ip, port)| PeerAddress {
                ip: ip.clone(),
                port: *port,
            })
            .collect();
        Ok(Self { addresses })
    }
}

impl AddressSource for ExternalAddresses {
    fn node_count(&self) -> usize {
        self.addresses.len()
    }

    fn peer_address(&self, index: NodeIndex) -> PeerAddress {
        self.addresses[index.get()].clone()
    }
}

/// Build one [`NetworkConfig`] per node. Node `i` lists every node but itself,
/// in index order, and listens on `listen_port`.
pub fn build_network_configs(source: &impl AddressSource, listen_port: u16) -> Vec<NetworkConfig> {
    let all: Vec<PeerAddress> = NodeIndex::range(source.node_count())
        .map(|i| source.peer_address(i))
        .collect();

    (0..all.len())
        .map(|own| NetworkConfig {
            port: listen_port,
            peers: all
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != own)
                .map(|(_, peer)| peer.clone())
                .collect(),
        })
        .collect()
}
