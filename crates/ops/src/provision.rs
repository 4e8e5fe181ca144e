//! A complete cluster generation run.

use std::path::PathBuf;

use chainforge_core::{
    AddressSource, ClusterMode, ConsensusConfig, ControllerConfig, DiscoveryMesh, DiscoveryPeer,
    DiscoveryTemplate, ExposureProfile, ExternalAddresses, GenesisConfig, KeyMaterial,
    NetworkConfig, NodeIndex, PortAllocator, PortBlock, ProvisionConstants, ServiceCatalog,
    ServiceRole, SynthesizedAddresses, SysConfig, Transport, build_network_configs,
    node_host_name, to_toml,
};
use chainforge_manifest::{ClusterLayout, ManifestAssembler, MultiLayout, to_yaml_stream};
use chainforge_tools::{DeviceIdGenerator, IdentityGenerator};
use secrecy::SecretString;
use serde::Serialize;
use tracing::info;

use crate::config::ForgeConfig;
use crate::error::OpsError;
use crate::keys::KeyOrchestrator;
use crate::layout::{
    CONSENSUS_CONFIG_FILE, CONTROLLER_CONFIG_FILE, ChainLayout, DISCOVERY_CONFIG_FILE,
    GENESIS_FILE, NETWORK_CONFIG_FILE, SYS_CONFIG_FILE, ensure_dir, write_file,
};
use crate::request::{ClusterRequest, TopologyRequest};

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub chain_name: String,
    pub mode: ClusterMode,
    pub node_count: usize,
    pub admin_address: String,
    /// Node addresses in node-index order.
    pub validators: Vec<String>,
    pub node_dirs: Vec<PathBuf>,
    pub manifest_path: PathBuf,
    /// External port blocks of a federated cluster.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub port_blocks: Vec<PortBlock>,
}

/// Everything derived before the first file is written.
struct Plan {
    catalog: ServiceCatalog,
    template: DiscoveryTemplate,
    network_configs: Vec<NetworkConfig>,
    discovery_hosts: Vec<(String, u16)>,
    port_blocks: Vec<PortBlock>,
    passwords: Vec<SecretString>,
}

/// Runs generation against a pair of collaborators.
pub struct Provisioner<'a, K: ?Sized, D: ?Sized> {
    constants: &'a ProvisionConstants,
    config: &'a ForgeConfig,
    identities: &'a K,
    devices: &'a D,
    timestamp: Option<u64>,
}

impl<'a, K, D> Provisioner<'a, K, D>
where
    K: IdentityGenerator + ?Sized,
    D: DeviceIdGenerator + ?Sized,
{
    pub fn new(
        constants: &'a ProvisionConstants,
        config: &'a ForgeConfig,
        identities: &'a K,
        devices: &'a D,
    ) -> Self {
        Self {
            constants,
            config,
            identities,
            devices,
            timestamp: None,
        }
    }

    /// Fix the genesis timestamp instead of reading the clock.
    #[must_use]
    pub fn with_timestamp(mut self, millis: u64) -> Self {
        self.timestamp = Some(millis);
        self
    }

    /// Generate every artifact of `request` under `work_dir`.
    ///
    /// Catalog, arity and port checks complete before anything is written.
    /// The manifest is written last, so its presence marks a finished run.
    pub fn run(&self, request: &ClusterRequest, work_dir: PathBuf) -> Result<RunSummary, OpsError> {
        let layout = ChainLayout::new(work_dir, &request.chain_name);
        let plan = self.plan(request, &layout)?;
        let node_count = request.node_count();
        let nodes: Vec<NodeIndex> = NodeIndex::range(node_count).collect();

        info!(
            chain = %request.chain_name,
            mode = %request.mode(),
            nodes = node_count,
            "generating cluster"
        );

        self.write_node_configs(request, &layout, &plan.network_configs)?;

        let keys = KeyOrchestrator::new(self.identities);
        let node_scopes: Vec<(PathBuf, &SecretString)> = nodes
            .iter()
            .map(|node| layout.node_dir(*node))
            .zip(plan.passwords.iter())
            .collect();
        let cluster_keys =
            keys.generate_cluster((&layout.admin_dir(), &plan.passwords[0]), &node_scopes)?;
        self.write_sys_config(request, &layout, &cluster_keys.admin, &cluster_keys.nodes)?;

        self.write_discovery_configs(request, &layout, &plan)?;

        let manifest_path = self.write_manifest(request, &layout, &plan)?;

        info!(
            chain = %request.chain_name,
            manifest = %manifest_path.display(),
            "cluster generated"
        );

        Ok(RunSummary {
            chain_name: request.chain_name.clone(),
            mode: request.mode(),
            node_count,
            admin_address: cluster_keys.admin.address,
            validators: cluster_keys.nodes.into_iter().map(|k| k.address).collect(),
            node_dirs: nodes.iter().map(|node| layout.node_dir(*node)).collect(),
            manifest_path,
            port_blocks: plan.port_blocks,
        })
    }

    fn plan(&self, request: &ClusterRequest, layout: &ChainLayout) -> Result<Plan, OpsError> {
        request.validate()?;

        let catalog_path = layout.resolve(&request.catalog_path);
        let catalog_source = std::fs::read_to_string(&catalog_path)
            .map_err(OpsError::io("failed to read service catalog", &catalog_path))?;
        let catalog = ServiceCatalog::from_toml_str(&catalog_source)?;

        let template = match &request.discovery_template {
            Some(path) => DiscoveryTemplate::from_file(&layout.resolve(path))?,
            None => DiscoveryTemplate::default(),
        };
        template.check(&self.constants.sync_folders)?;

        let ports = &self.constants.ports;
        let (network_configs, discovery_hosts, port_blocks) = match &request.topology {
            TopologyRequest::Local(local) => {
                let source = SynthesizedAddresses::new(
                    &request.chain_name,
                    local.peers_count,
                    ports.ledger_network,
                );
                let hosts = NodeIndex::range(local.peers_count)
                    .map(|node| (node_host_name(&request.chain_name, node), ports.discovery))
                    .collect();
                (
                    build_network_configs(&source, ports.ledger_network),
                    hosts,
                    Vec::new(),
                )
            }
            TopologyRequest::Multi(multi) => {
                let source = ExternalAddresses::new(&multi.node_ips, &multi.node_ports)?;
                let profile = ExposureProfile {
                    monitoring: request.monitoring,
                    executor: catalog.executor_kind(),
                };
                let blocks = PortAllocator::new(ports, profile).allocate(&multi.node_ports)?;
                let hosts = NodeIndex::range(source.node_count())
                    .map(|node| {
                        (
                            multi.node_ips[node.get()].clone(),
                            PortAllocator::discovery_port(multi.node_ports[node.get()]),
                        )
                    })
                    .collect();
                (
                    build_network_configs(&source, ports.ledger_network),
                    hosts,
                    blocks,
                )
            }
        };

        Ok(Plan {
            catalog,
            template,
            network_configs,
            discovery_hosts,
            port_blocks,
            passwords: request.node_passwords(),
        })
    }

    fn write_node_configs(
        &self,
        request: &ClusterRequest,
        layout: &ChainLayout,
        network_configs: &[NetworkConfig],
    ) -> Result<(), OpsError> {
        let timestamp = self.timestamp.unwrap_or_else(now_millis);
        let genesis = to_toml(&GenesisConfig::new(timestamp, self.constants))?;
        let controller = to_toml(&ControllerConfig::new(
            &self.constants.ports,
            request.block_delay_number,
        ))?;

        for (node, network) in NodeIndex::range(network_configs.len()).zip(network_configs) {
            let dir = layout.node_dir(node);
            ensure_dir(&dir)?;
            write_file(&dir.join(NETWORK_CONFIG_FILE), network.to_toml()?)?;
            write_file(
                &dir.join(CONSENSUS_CONFIG_FILE),
                to_toml(&ConsensusConfig::new(&self.constants.ports, node))?,
            )?;
            write_file(&dir.join(CONTROLLER_CONFIG_FILE), &controller)?;
            write_file(&dir.join(GENESIS_FILE), &genesis)?;
            for role in ServiceRole::ALL {
                write_file(
                    &dir.join(format!("{role}-log4rs.yaml")),
                    self.constants.log_config(role),
                )?;
            }
        }
        Ok(())
    }

    fn write_sys_config(
        &self,
        request: &ClusterRequest,
        layout: &ChainLayout,
        admin: &KeyMaterial,
        validators: &[KeyMaterial],
    ) -> Result<(), OpsError> {
        let sys_config = SysConfig::new(self.constants, admin, request.block_interval, validators)?;
        let contents = to_toml(&sys_config)?;
        for node in NodeIndex::range(validators.len()) {
            write_file(&layout.node_dir(node).join(SYS_CONFIG_FILE), &contents)?;
        }
        Ok(())
    }

    fn write_discovery_configs(
        &self,
        request: &ClusterRequest,
        layout: &ChainLayout,
        plan: &Plan,
    ) -> Result<(), OpsError> {
        let mut peers = Vec::with_capacity(plan.discovery_hosts.len());
        let nodes = NodeIndex::range(plan.discovery_hosts.len());
        for (node, (host, port)) in nodes.zip(&plan.discovery_hosts) {
            let device_id = self.devices.generate_device_id(&layout.discovery_dir(node))?;
            peers.push(DiscoveryPeer {
                host: host.clone(),
                port: *port,
                device_id,
            });
        }

        let mesh = DiscoveryMesh::new(
            peers,
            Transport::for_mode(request.mode()),
            &request.chain_name,
            self.constants.sync_folders.clone(),
        );
        let documents = mesh.render_all(&plan.template)?;
        for (node, document) in NodeIndex::range(documents.len()).zip(documents) {
            let dir = layout.discovery_dir(node);
            ensure_dir(&dir)?;
            write_file(&dir.join(DISCOVERY_CONFIG_FILE), document)?;
        }
        Ok(())
    }

    fn write_manifest(
        &self,
        request: &ClusterRequest,
        layout: &ChainLayout,
        plan: &Plan,
    ) -> Result<PathBuf, OpsError> {
        let assembler = ManifestAssembler {
            chain_name: &request.chain_name,
            catalog: &plan.catalog,
            constants: self.constants,
            images: &self.config.images,
            monitoring: request.monitoring,
        };
        let cluster = match &request.topology {
            TopologyRequest::Local(local) => ClusterLayout::Local {
                claim_name: &local.pvc_name,
            },
            TopologyRequest::Multi(multi) => ClusterLayout::Multi(MultiLayout {
                port_blocks: &plan.port_blocks,
                claim_names: &multi.pvc_names,
                lb_tokens: &multi.lb_tokens,
                annotation_key: &self.config.load_balancer.annotation_key,
            }),
        };
        let resources = assembler.assemble(cluster, &plan.passwords)?;
        let path = layout.manifest_path();
        write_file(&path, to_yaml_stream(&resources)?)?;
        Ok(path)
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
