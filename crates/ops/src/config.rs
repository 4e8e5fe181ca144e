//! Configuration for generation runs, loaded from an optional TOML file.

use std::path::Path;

use chainforge_manifest::{DEFAULT_LB_ANNOTATION, SidecarImages};
use chainforge_tools::{ProcessDeviceIdGenerator, ProcessIdentityGenerator};
use serde::Deserialize;

use crate::error::OpsError;

/// Top-level configuration.
///
/// # Example
///
/// ```toml
/// [tools]
/// kms_program = "./kms"
/// discovery_program = "docker"
/// discovery_args = ["run", "--rm", "-v", "{dir}:{dir}", "syncthing/syncthing:latest"]
///
/// [images]
/// monitor_exporter = "registry.local/ledger-exporter:v2"
///
/// [load_balancer]
/// annotation_key = "service.beta.kubernetes.io/aws-load-balancer-eip-allocations"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ForgeConfig {
    /// External collaborator programs.
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Images of containers not declared by the service catalog.
    #[serde(default)]
    pub images: SidecarImages,
    /// Load balancer settings of federated clusters.
    #[serde(default)]
    pub load_balancer: LoadBalancerConfig,
}

impl ForgeConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load `path`, or the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, OpsError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(OpsError::io("failed to read configuration", path))?;
        Self::from_toml_str(&contents).map_err(|e| OpsError::ConfigFile {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

/// External collaborator programs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolsConfig {
    /// Key-generation binary.
    #[serde(default = "default_kms_program")]
    pub kms_program: String,
    /// Discovery daemon binary (or a container runtime wrapping it).
    #[serde(default = "default_discovery_program")]
    pub discovery_program: String,
    /// Arguments placed before `-generate=<dir>`. `{dir}` is replaced with the
    /// target directory.
    #[serde(default)]
    pub discovery_args: Vec<String>,
}

impl ToolsConfig {
    pub fn identity_generator(&self) -> ProcessIdentityGenerator {
        ProcessIdentityGenerator::new(&self.kms_program)
    }

    pub fn device_id_generator(&self) -> ProcessDeviceIdGenerator {
        ProcessDeviceIdGenerator::new(&self.discovery_program)
            .with_leading_args(self.discovery_args.clone())
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            kms_program: default_kms_program(),
            discovery_program: default_discovery_program(),
            discovery_args: Vec::new(),
        }
    }
}

fn default_kms_program() -> String {
    "kms".to_owned()
}

fn default_discovery_program() -> String {
    "syncthing".to_owned()
}

/// Load balancer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoadBalancerConfig {
    /// Annotation the per-node load-balancer token is written under.
    #[serde(default = "default_annotation_key")]
    pub annotation_key: String,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            annotation_key: default_annotation_key(),
        }
    }
}

fn default_annotation_key() -> String {
    DEFAULT_LB_ANNOTATION.to_owned()
}
