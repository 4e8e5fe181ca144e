use std::path::Path;

use chainforge_ops::{ForgeConfig, create_device};

use crate::OutputFormat;

pub fn run(config: &ForgeConfig, work_dir: &Path, format: &OutputFormat) -> anyhow::Result<()> {
    let generator = config.tools.device_id_generator();
    let device = create_device(&generator, work_dir)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&device)?),
        OutputFormat::Text => {
            println!("Created device {}", device.device_id);
            println!("  dir: {}", device.dir.display());
        }
    }
    Ok(())
}
