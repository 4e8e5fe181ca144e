use std::path::Path;

use chainforge_ops::{write_local_storage, write_nfs_storage};
use clap::Args;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct LocalPvcArgs {
    /// Host directory backing the volume.
    #[arg(long, default_value = "/home/docker/chainforge-datadir")]
    pub data_dir: String,
    /// Host names of the Kubernetes nodes allowed to mount the volume.
    #[arg(long, value_delimiter = ',', default_value = "minikube")]
    pub node_list: Vec<String>,
}

#[derive(Args, Debug)]
pub struct NfsPvcArgs {
    /// NFS server address.
    #[arg(long)]
    pub nfs_server: String,
    /// Exported path on the server.
    #[arg(long)]
    pub nfs_path: String,
}

pub fn run_local(work_dir: &Path, args: &LocalPvcArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let path = write_local_storage(work_dir, &args.data_dir, &args.node_list)?;
    print_path(&path, format)
}

pub fn run_nfs(work_dir: &Path, args: &NfsPvcArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let path = write_nfs_storage(work_dir, &args.nfs_server, &args.nfs_path)?;
    print_path(&path, format)
}

fn print_path(path: &Path, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({ "manifest_path": path });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => println!("Wrote {}", path.display()),
    }
    Ok(())
}
