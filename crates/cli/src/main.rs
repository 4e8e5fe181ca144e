//! chainforge CLI
//!
//! Generates configuration artifacts and deployment manifests for a
//! multi-node ledger cluster.

mod commands;

use std::path::PathBuf;

use chainforge_ops::ForgeConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

/// chainforge: generate ledger cluster configuration and manifests.
#[derive(Parser, Debug)]
#[command(name = "chainforge", version, about)]
struct Cli {
    /// Directory artifacts are written to. Relative input paths resolve
    /// against it.
    #[arg(long, env = "CHAINFORGE_WORK_DIR", default_value = ".", global = true)]
    work_dir: PathBuf,

    /// Path to the TOML configuration file. Defaults apply when it is absent.
    #[arg(long, env = "CHAINFORGE_CONFIG", default_value = "chainforge.toml", global = true)]
    config: PathBuf,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a chain whose nodes share one Kubernetes cluster.
    LocalCluster(commands::cluster::LocalClusterArgs),
    /// Create a chain whose nodes are reached at external addresses.
    MultiCluster(commands::cluster::MultiClusterArgs),
    /// Create a host-path volume and claim for node data.
    LocalPvc(commands::storage::LocalPvcArgs),
    /// Create an NFS volume and claim for node data.
    NfsPvc(commands::storage::NfsPvcArgs),
    /// Create a standalone account.
    CreateAccount(commands::account::CreateAccountArgs),
    /// Create a standalone discovery device.
    CreateDevice,
}

fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let work_dir = std::path::absolute(&cli.work_dir)?;

    match cli.command {
        Command::LocalCluster(args) => {
            let config = load_config(&work_dir, &cli.config)?;
            commands::cluster::run_local(&config, &work_dir, args, &cli.format)
        }
        Command::MultiCluster(args) => {
            let config = load_config(&work_dir, &cli.config)?;
            commands::cluster::run_multi(&config, &work_dir, args, &cli.format)
        }
        Command::LocalPvc(args) => commands::storage::run_local(&work_dir, &args, &cli.format),
        Command::NfsPvc(args) => commands::storage::run_nfs(&work_dir, &args, &cli.format),
        Command::CreateAccount(args) => {
            let config = load_config(&work_dir, &cli.config)?;
            commands::account::run(&config, &work_dir, args, &cli.format)
        }
        Command::CreateDevice => {
            let config = load_config(&work_dir, &cli.config)?;
            commands::device::run(&config, &work_dir, &cli.format)
        }
    }
}

fn load_config(work_dir: &std::path::Path, path: &std::path::Path) -> anyhow::Result<ForgeConfig> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        work_dir.join(path)
    };
    Ok(ForgeConfig::load(&path)?)
}
