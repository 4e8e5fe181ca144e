use std::path::{Path, PathBuf};

use chainforge_ops::chainforge_core::ProvisionConstants;
use chainforge_ops::{
    ClusterRequest, ForgeConfig, LocalRequest, MultiRequest, Provisioner, RunSummary,
    TopologyRequest,
};
use clap::Args;
use secrecy::SecretString;

use crate::OutputFormat;

/// Options shared by both cluster modes.
#[derive(Args, Debug)]
pub struct ChainArgs {
    /// Chain name, used for directories and resource names.
    #[arg(long, default_value = "test-chain")]
    pub chain_name: String,
    /// Block delay number written to the controller config.
    #[arg(long, default_value_t = 6)]
    pub block_delay_number: u32,
    /// Seconds between blocks.
    #[arg(long, default_value_t = 3)]
    pub block_interval: u32,
    /// Service catalog file.
    #[arg(long, default_value = "service-config.toml")]
    pub service_config: PathBuf,
    /// Discovery base template. The built-in template is used when omitted.
    #[arg(long)]
    pub discovery_template: Option<PathBuf>,
    /// Deploy monitoring sidecars.
    #[arg(long)]
    pub need_monitor: bool,
}

#[derive(Args, Debug)]
pub struct LocalClusterArgs {
    #[command(flatten)]
    pub chain: ChainArgs,
    /// Number of nodes.
    #[arg(long, default_value_t = 2)]
    pub peers_count: usize,
    /// Key-service passphrase shared by every node.
    #[arg(long, env = "CHAINFORGE_KMS_PASSWORD", hide_env_values = true)]
    pub kms_password: String,
    /// Claim holding the data of every node.
    #[arg(long, default_value = "local-pvc")]
    pub pvc_name: String,
}

#[derive(Args, Debug)]
pub struct MultiClusterArgs {
    #[command(flatten)]
    pub chain: ChainArgs,
    /// Externally reachable address of each node.
    #[arg(long, value_delimiter = ',', required = true)]
    pub node_ips: Vec<String>,
    /// Base of each node's external port block.
    #[arg(long, value_delimiter = ',', required = true)]
    pub node_ports: Vec<u16>,
    /// Key-service passphrase of each node, in node order. Separate values
    /// with spaces or repeat the flag; commas belong to the passphrase.
    #[arg(long, num_args = 1.., required = true)]
    pub kms_passwords: Vec<String>,
    /// Load balancer identifier of each node.
    #[arg(long, value_delimiter = ',', required = true)]
    pub lb_tokens: Vec<String>,
    /// Data claim of each node.
    #[arg(long, value_delimiter = ',', required = true)]
    pub pvc_names: Vec<String>,
}

pub fn run_local(
    config: &ForgeConfig,
    work_dir: &Path,
    args: LocalClusterArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let topology = TopologyRequest::Local(LocalRequest {
        peers_count: args.peers_count,
        kms_password: SecretString::new(args.kms_password),
        pvc_name: args.pvc_name,
    });
    provision(config, work_dir, request(args.chain, topology), format)
}

pub fn run_multi(
    config: &ForgeConfig,
    work_dir: &Path,
    args: MultiClusterArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let topology = TopologyRequest::Multi(MultiRequest {
        node_ips: args.node_ips,
        node_ports: args.node_ports,
        kms_passwords: args.kms_passwords.into_iter().map(SecretString::new).collect(),
        lb_tokens: args.lb_tokens,
        pvc_names: args.pvc_names,
    });
    provision(config, work_dir, request(args.chain, topology), format)
}

fn request(chain: ChainArgs, topology: TopologyRequest) -> ClusterRequest {
    ClusterRequest {
        chain_name: chain.chain_name,
        block_delay_number: chain.block_delay_number,
        block_interval: chain.block_interval,
        monitoring: chain.need_monitor,
        catalog_path: chain.service_config,
        discovery_template: chain.discovery_template,
        topology,
    }
}

fn provision(
    config: &ForgeConfig,
    work_dir: &Path,
    request: ClusterRequest,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let constants = ProvisionConstants::default();
    let identities = config.tools.identity_generator();
    let devices = config.tools.device_id_generator();
    let summary = Provisioner::new(&constants, config, &identities, &devices)
        .run(&request, work_dir.to_path_buf())?;
    print_summary(&summary, format)
}

fn print_summary(summary: &RunSummary, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Text => {
            println!(
                "Generated {} cluster {} ({} nodes)",
                summary.mode, summary.chain_name, summary.node_count
            );
            println!("  admin:    {}", summary.admin_address);
            for (dir, address) in summary.node_dirs.iter().zip(&summary.validators) {
                println!("  node:     {address}  {}", dir.display());
            }
            for block in &summary.port_blocks {
                let ports: Vec<String> = block
                    .ports
                    .iter()
                    .map(|p| format!("{:?}={}->{}", p.kind, p.external, p.target))
                    .collect();
                println!("  ports {}:  {}", block.node, ports.join(" "));
            }
            println!("  manifest: {}", summary.manifest_path.display());
        }
    }
    Ok(())
}
