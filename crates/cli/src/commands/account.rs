use std::path::Path;

use chainforge_ops::{ForgeConfig, create_account};
use clap::Args;
use secrecy::SecretString;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct CreateAccountArgs {
    /// Key-service passphrase protecting the new key.
    #[arg(long, env = "CHAINFORGE_KMS_PASSWORD", hide_env_values = true)]
    pub kms_password: String,
}

pub fn run(
    config: &ForgeConfig,
    work_dir: &Path,
    args: CreateAccountArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let generator = config.tools.identity_generator();
    let password = SecretString::new(args.kms_password);
    let account = create_account(&generator, work_dir, &password)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&account)?),
        OutputFormat::Text => {
            println!("Created account {}", account.address);
            println!("  key_id: {}", account.key_id);
            println!("  dir:    {}", account.dir.display());
        }
    }
    Ok(())
}
