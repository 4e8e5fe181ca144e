//! Parameters of a generation run and their validation.

use std::path::PathBuf;
use std::sync::LazyLock;

use chainforge_core::{ClusterMode, ProvisionError};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

/// Longest accepted chain name. Resource names derived from it must stay
/// within the 63-character limit of Kubernetes service names.
pub const MAX_CHAIN_NAME_LEN: usize = 40;

/// Chain names become host names and resource names: lowercase letters,
/// digits and inner dashes, starting with a letter.
static CHAIN_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("chain name regex is valid")
});

/// Everything a generation run needs besides the tools and the config file.
#[derive(Debug)]
pub struct ClusterRequest {
    pub chain_name: String,
    /// Written to the controller config.
    pub block_delay_number: u32,
    /// Seconds between blocks, written to the system config.
    pub block_interval: u32,
    /// Deploy monitoring sidecars.
    pub monitoring: bool,
    /// Service catalog file, relative to the working directory unless absolute.
    pub catalog_path: PathBuf,
    /// Discovery base template. The built-in template is used when absent.
    pub discovery_template: Option<PathBuf>,
    pub topology: TopologyRequest,
}

/// Mode-specific parameters.
#[derive(Debug)]
pub enum TopologyRequest {
    Local(LocalRequest),
    Multi(MultiRequest),
}

/// A co-located cluster: nodes are synthesized from the chain name.
#[derive(Debug)]
pub struct LocalRequest {
    pub peers_count: usize,
    /// Shared by the key services of every node.
    pub kms_password: SecretString,
    /// Claim holding every node's data.
    pub pvc_name: String,
}

/// A federated cluster: one entry per node in every list.
#[derive(Debug)]
pub struct MultiRequest {
    pub node_ips: Vec<String>,
    /// Base ports of each node's external port block.
    pub node_ports: Vec<u16>,
    pub kms_passwords: Vec<SecretString>,
    pub lb_tokens: Vec<String>,
    pub pvc_names: Vec<String>,
}

impl ClusterRequest {
    pub fn mode(&self) -> ClusterMode {
        match self.topology {
            TopologyRequest::Local(_) => ClusterMode::Local,
            TopologyRequest::Multi(_) => ClusterMode::Multi,
        }
    }

    pub fn node_count(&self) -> usize {
        match &self.topology {
            TopologyRequest::Local(local) => local.peers_count,
            TopologyRequest::Multi(multi) => multi.node_ips.len(),
        }
    }

    /// Key-service passphrase of every node, in node-index order.
    pub fn node_passwords(&self) -> Vec<SecretString> {
        match &self.topology {
            TopologyRequest::Local(local) => (0..local.peers_count)
                .map(|_| SecretString::new(local.kms_password.expose_secret().clone()))
                .collect(),
            TopologyRequest::Multi(multi) => multi
                .kms_passwords
                .iter()
                .map(|p| SecretString::new(p.expose_secret().clone()))
                .collect(),
        }
    }

    /// Check every parameter that can be checked without touching the disk.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        validate_chain_name(&self.chain_name)?;
        if self.block_interval == 0 {
            return Err(ProvisionError::Configuration(
                "block_interval must be at least 1 second".to_owned(),
            ));
        }
        if self.node_count() == 0 {
            return Err(ProvisionError::Configuration(
                "a cluster needs at least one node".to_owned(),
            ));
        }
        if let TopologyRequest::Multi(multi) = &self.topology {
            let expected = multi.node_ips.len();
            check_arity("node_ports", expected, multi.node_ports.len())?;
            check_arity("kms_passwords", expected, multi.kms_passwords.len())?;
            check_arity("lb_tokens", expected, multi.lb_tokens.len())?;
            check_arity("pvc_names", expected, multi.pvc_names.len())?;
        }
        Ok(())
    }
}

/// Reject chain names that cannot be used as host and resource names.
pub fn validate_chain_name(name: &str) -> Result<(), ProvisionError> {
    if name.len() > MAX_CHAIN_NAME_LEN || !CHAIN_NAME_RE.is_match(name) {
        return Err(ProvisionError::Configuration(format!(
            "invalid chain name `{name}`: use at most {MAX_CHAIN_NAME_LEN} lowercase letters, \
             digits and dashes, starting with a letter"
        )));
    }
    Ok(())
}

fn check_arity(field: &'static str, expected: usize, actual: usize) -> Result<(), ProvisionError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ProvisionError::ArityMismatch {
            field,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_owned())
    }

    fn local(n: usize) -> ClusterRequest {
        ClusterRequest {
            chain_name: "test-chain".into(),
            block_delay_number: 6,
            block_interval: 3,
            monitoring: false,
            catalog_path: "service-config.toml".into(),
            discovery_template: None,
            topology: TopologyRequest::Local(LocalRequest {
                peers_count: n,
                kms_password: secret("pw"),
                pvc_name: "local-pvc".into(),
            }),
        }
    }

    fn multi(ips: usize, ports: usize, passwords: usize, tokens: usize, pvcs: usize) -> ClusterRequest {
        ClusterRequest {
            topology: TopologyRequest::Multi(MultiRequest {
                node_ips: (0..ips).map(|i| format!("10.0.0.{i}")).collect(),
                node_ports: (0..ports).map(|i| 30000 + 100 * i as u16).collect(),
                kms_passwords: (0..passwords).map(|i| secret(&format!("pw{i}"))).collect(),
                lb_tokens: (0..tokens).map(|i| format!("lb{i}")).collect(),
                pvc_names: (0..pvcs).map(|i| format!("pvc{i}")).collect(),
            }),
            ..local(0)
        }
    }

    #[test]
    fn local_request_is_valid() {
        let request = local(2);
        request.validate().unwrap();
        assert_eq!(request.mode(), ClusterMode::Local);
        assert_eq!(request.node_passwords().len(), 2);
    }

    #[test]
    fn zero_nodes_rejected() {
        assert!(local(0).validate().is_err());
    }

    #[test]
    fn zero_block_interval_rejected() {
        let request = ClusterRequest {
            block_interval: 0,
            ..local(1)
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn multi_arity_is_checked_per_list() {
        multi(3, 3, 3, 3, 3).validate().unwrap();
        let cases = [
            (multi(3, 2, 3, 3, 3), "node_ports"),
            (multi(3, 3, 4, 3, 3), "kms_passwords"),
            (multi(3, 3, 3, 1, 3), "lb_tokens"),
            (multi(3, 3, 3, 3, 0), "pvc_names"),
        ];
        for (request, expected_field) in cases {
            match request.validate().unwrap_err() {
                ProvisionError::ArityMismatch { field, expected, .. } => {
                    assert_eq!(field, expected_field);
                    assert_eq!(expected, 3);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn chain_names() {
        for good in ["test-chain", "a", "chain2"] {
            validate_chain_name(good).unwrap();
        }
        let too_long = "x".repeat(MAX_CHAIN_NAME_LEN + 1);
        for bad in ["", "Test", "-chain", "chain-", "2chain", "a_b", too_long.as_str()] {
            assert!(validate_chain_name(bad).is_err(), "{bad}");
        }
    }
}
