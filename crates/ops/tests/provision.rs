use std::fs;
use std::path::{Path, PathBuf};

use chainforge_core::{DeviceId, NetworkConfig, PeerAddress, ProvisionConstants, ProvisionError};
use chainforge_manifest::{ManifestResource, from_yaml_stream, resource::ServiceType};
use chainforge_ops::{
    ClusterRequest, ForgeConfig, GENESIS_FILE, KEY_ID_FILE, LocalRequest, MultiRequest,
    NETWORK_CONFIG_FILE, NODE_ADDRESS_FILE, OpsError, Provisioner, SYS_CONFIG_FILE,
    TopologyRequest,
};
use chainforge_tools::{
    DeviceIdGenerator, MemoryDeviceIdGenerator, MemoryIdentityGenerator, PASSPHRASE_FILE, ToolError,
};
use secrecy::SecretString;

const CATALOG_FILE: &str = "service-config.toml";

fn catalog(executor_image: &str, last_role: &str) -> String {
    format!(
        r#"
[[services]]
name = "network"
image = "ledger/network:v6"
command = ["network", "run", "-p", "50000"]

[[services]]
name = "consensus"
image = "ledger/consensus:v6"

[[services]]
name = "executor"
image = "{executor_image}"

[[services]]
name = "storage"
image = "ledger/storage:v6"

[[services]]
name = "controller"
image = "ledger/controller:v6"

[[services]]
name = "{last_role}"
image = "ledger/kms:v6"
"#
    )
}

fn work_dir_with_catalog(contents: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(CATALOG_FILE), contents).unwrap();
    dir
}

fn local_request(peers: usize) -> ClusterRequest {
    ClusterRequest {
        chain_name: "test-chain".into(),
        block_delay_number: 6,
        block_interval: 3,
        monitoring: false,
        catalog_path: CATALOG_FILE.into(),
        discovery_template: None,
        topology: TopologyRequest::Local(LocalRequest {
            peers_count: peers,
            kms_password: SecretString::new("123456".into()),
            pvc_name: "local-pvc".into(),
        }),
    }
}

fn multi_request(ports: Vec<u16>) -> ClusterRequest {
    let n = ports.len();
    ClusterRequest {
        chain_name: "fed-chain".into(),
        monitoring: true,
        topology: TopologyRequest::Multi(MultiRequest {
            node_ips: (0..n).map(|i| format!("192.168.1.{}", i + 10)).collect(),
            node_ports: ports,
            kms_passwords: (0..n)
                .map(|i| SecretString::new(format!("pw-{i}")))
                .collect(),
            lb_tokens: (0..n).map(|i| format!("lb-{i}")).collect(),
            pvc_names: (0..n).map(|i| format!("pvc-{i}")).collect(),
        }),
        ..local_request(0)
    }
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

/// Entries of the working directory other than the catalog file.
fn generated_entries(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| !p.ends_with(CATALOG_FILE))
        .collect()
}

#[test]
fn local_cluster_end_to_end() {
    let dir = work_dir_with_catalog(&catalog("ledger/executor:v6", "kms"));
    let constants = ProvisionConstants::default();
    let config = ForgeConfig::default();
    let identities = MemoryIdentityGenerator::new();
    let devices = MemoryDeviceIdGenerator::new();

    let summary = Provisioner::new(&constants, &config, &identities, &devices)
        .with_timestamp(1_700_000_000_000)
        .run(&local_request(2), dir.path().to_path_buf())
        .unwrap();

    assert_eq!(summary.node_count, 2);
    assert_eq!(summary.manifest_path, dir.path().join("test-chain.yaml"));

    let node0 = dir.path().join("test-chain/node0");
    let node1 = dir.path().join("test-chain/node1");

    let net0 = NetworkConfig::from_toml(&read(node0.join(NETWORK_CONFIG_FILE))).unwrap();
    let net1 = NetworkConfig::from_toml(&read(node1.join(NETWORK_CONFIG_FILE))).unwrap();
    assert_eq!(
        net0.peers,
        vec![PeerAddress {
            ip: "test-chain-1".into(),
            port: 40000
        }]
    );
    assert_eq!(
        net1.peers,
        vec![PeerAddress {
            ip: "test-chain-0".into(),
            port: 40000
        }]
    );

    assert_eq!(read(node0.join(GENESIS_FILE)), read(node1.join(GENESIS_FILE)));
    assert!(read(node0.join(GENESIS_FILE)).contains("timestamp = 1700000000000"));

    let sys0 = read(node0.join(SYS_CONFIG_FILE));
    assert_eq!(sys0, read(node1.join(SYS_CONFIG_FILE)));
    let sys: toml::Value = toml::from_str(&sys0).unwrap();
    let validators = sys["validators"].as_array().unwrap();
    assert_eq!(validators.len(), 2);
    assert_eq!(sys["admin"].as_str().unwrap(), summary.admin_address);
    assert!(
        !validators
            .iter()
            .any(|v| v.as_str() == Some(summary.admin_address.as_str()))
    );
    assert_eq!(validators[0].as_str().unwrap(), read(node0.join(NODE_ADDRESS_FILE)));
    assert_eq!(validators[1].as_str().unwrap(), read(node1.join(NODE_ADDRESS_FILE)));

    // admin first, then nodes in index order
    assert_eq!(read(dir.path().join("test-chain/admin").join(KEY_ID_FILE)), "1");
    assert_eq!(read(node0.join(KEY_ID_FILE)), "2");
    assert_eq!(read(node1.join(KEY_ID_FILE)), "3");
    assert!(!node0.join(PASSPHRASE_FILE).exists());

    for role in ["network", "consensus", "executor", "storage", "controller", "kms"] {
        assert!(node1.join(format!("{role}-log4rs.yaml")).is_file(), "{role}");
    }
    assert!(read(node0.join("controller-config.toml")).contains("block_delay_number = 6"));

    let xml = read(node0.join("config/config.xml"));
    assert_eq!(xml.matches("compression=\"always\"").count(), 2);
    assert_eq!(xml.matches("introducedBy=\"\"/>").count(), 3 * 2);
    assert!(xml.contains("<address>quic://test-chain-1:22000</address>"));
    assert!(!xml.contains("<address>tcp://"));
    assert!(xml.contains("<apikey>test-chain</apikey>"));

    let docs = from_yaml_stream(&read(&summary.manifest_path)).unwrap();
    let names: Vec<(&str, &str)> = docs.iter().map(|d| (d.kind(), d.name())).collect();
    assert_eq!(names[0], ("Service", "test-chain-node-port"));
    assert_eq!(names.len(), 1 + 2 * 4);
    assert_eq!(names.last(), Some(&("Pod", "test-chain-1")));
}

#[test]
fn multi_cluster_end_to_end() {
    let dir = work_dir_with_catalog(&catalog("ledger/executor:chaincode-v6", "kms"));
    let constants = ProvisionConstants::default();
    let config = ForgeConfig::default();
    let identities = MemoryIdentityGenerator::new();
    let devices = MemoryDeviceIdGenerator::new();

    let summary = Provisioner::new(&constants, &config, &identities, &devices)
        .run(&multi_request(vec![30000, 30100]), dir.path().to_path_buf())
        .unwrap();
    assert_eq!(summary.port_blocks.len(), 2);

    let node0 = dir.path().join("fed-chain/node0");
    let net0 = NetworkConfig::from_toml(&read(node0.join(NETWORK_CONFIG_FILE))).unwrap();
    assert_eq!(net0.port, 40000);
    assert_eq!(
        net0.peers,
        vec![PeerAddress {
            ip: "192.168.1.11".into(),
            port: 30100
        }]
    );

    let xml = read(node0.join("config/config.xml"));
    assert!(xml.contains("<address>tcp://192.168.1.11:30101</address>"));
    assert!(!xml.contains("<address>quic://"));

    let docs = from_yaml_stream(&read(&summary.manifest_path)).unwrap();
    let lbs: Vec<_> = docs
        .iter()
        .filter_map(|d| match d {
            ManifestResource::Service(s) if s.spec.service_type == ServiceType::LoadBalancer => {
                Some(s)
            }
            _ => None,
        })
        .collect();
    assert_eq!(lbs.len(), 2);
    assert_eq!(lbs[1].metadata.name, "fed-chain-1-lb");
    let rpc = lbs[1].spec.ports.iter().find(|p| p.name == "rpc").unwrap();
    assert_eq!(rpc.port, 30102);
    assert_eq!(rpc.target_port, 50004);
    assert!(
        lbs[0]
            .metadata
            .annotations
            .values()
            .any(|token| token == "lb-0")
    );
}

#[test]
fn colliding_ports_write_nothing() {
    let dir = work_dir_with_catalog(&catalog("ledger/executor:v6", "kms"));
    let constants = ProvisionConstants::default();
    let config = ForgeConfig::default();
    let identities = MemoryIdentityGenerator::new();
    let devices = MemoryDeviceIdGenerator::new();

    let err = Provisioner::new(&constants, &config, &identities, &devices)
        .run(&multi_request(vec![30000, 30003]), dir.path().to_path_buf())
        .unwrap_err();
    assert!(matches!(
        err,
        OpsError::Provision(ProvisionError::PortCollision { .. })
    ));
    assert!(generated_entries(dir.path()).is_empty());
    assert!(identities.scopes().is_empty());
}

#[test]
fn incomplete_catalog_writes_nothing() {
    let dir = work_dir_with_catalog(&catalog("ledger/executor:v6", "network"));
    let constants = ProvisionConstants::default();
    let config = ForgeConfig::default();
    let identities = MemoryIdentityGenerator::new();
    let devices = MemoryDeviceIdGenerator::new();

    let err = Provisioner::new(&constants, &config, &identities, &devices)
        .run(&local_request(2), dir.path().to_path_buf())
        .unwrap_err();
    match err {
        OpsError::Provision(ProvisionError::Catalog { detail, required }) => {
            assert!(detail.contains("kms"), "{detail}");
            assert!(required.contains("kms"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(generated_entries(dir.path()).is_empty());
}

#[test]
fn arity_mismatch_writes_nothing() {
    let dir = work_dir_with_catalog(&catalog("ledger/executor:v6", "kms"));
    let constants = ProvisionConstants::default();
    let config = ForgeConfig::default();
    let identities = MemoryIdentityGenerator::new();
    let devices = MemoryDeviceIdGenerator::new();

    let mut request = multi_request(vec![30000, 30100, 30200]);
    if let TopologyRequest::Multi(multi) = &mut request.topology {
        multi.lb_tokens.pop();
    }
    let err = Provisioner::new(&constants, &config, &identities, &devices)
        .run(&request, dir.path().to_path_buf())
        .unwrap_err();
    assert!(matches!(
        err,
        OpsError::Provision(ProvisionError::ArityMismatch {
            field: "lb_tokens",
            ..
        })
    ));
    assert!(generated_entries(dir.path()).is_empty());
}

struct BrokenDiscovery;

impl DeviceIdGenerator for BrokenDiscovery {
    fn generate_device_id(&self, _config_dir: &Path) -> Result<DeviceId, ToolError> {
        Err(ToolError::Output(ProvisionError::CollaboratorOutput {
            tool: "discovery",
            detail: "no device id marker".into(),
        }))
    }
}

#[test]
fn collaborator_failure_leaves_no_manifest() {
    let dir = work_dir_with_catalog(&catalog("ledger/executor:v6", "kms"));
    let constants = ProvisionConstants::default();
    let config = ForgeConfig::default();
    let identities = MemoryIdentityGenerator::new();

    let err = Provisioner::new(&constants, &config, &identities, &BrokenDiscovery)
        .run(&local_request(2), dir.path().to_path_buf())
        .unwrap_err();
    assert!(matches!(err, OpsError::Tool(ToolError::Output(_))));
    assert!(!dir.path().join("test-chain.yaml").exists());
}

#[test]
fn custom_discovery_template_is_used() {
    let dir = work_dir_with_catalog(&catalog("ledger/executor:v6", "kms"));
    fs::write(
        dir.path().join("config.xml"),
        r#"<configuration version="37">
    <folder id="blocks" path="/var/syncthing/blocks"></folder>
    <folder id="proposals" path="/var/syncthing/proposals"/>
    <folder id="txs" path="/var/syncthing/txs"></folder>
    <gui enabled="true"><apikey>stale</apikey></gui>
</configuration>"#,
    )
    .unwrap();
    let constants = ProvisionConstants::default();
    let config = ForgeConfig::default();
    let identities = MemoryIdentityGenerator::new();
    let devices = MemoryDeviceIdGenerator::new();

    let request = ClusterRequest {
        discovery_template: Some("config.xml".into()),
        ..local_request(3)
    };
    Provisioner::new(&constants, &config, &identities, &devices)
        .run(&request, dir.path().to_path_buf())
        .unwrap();

    let xml = read(dir.path().join("test-chain/node2/config/config.xml"));
    assert_eq!(xml.matches("introducedBy=\"\"/>").count(), 3 * 3);
    assert_eq!(xml.matches("compression=\"always\"").count(), 3);
    assert!(!xml.contains("stale"));
    assert!(xml.contains("<apikey>test-chain</apikey>"));
}

#[test]
fn template_without_gui_writes_nothing() {
    let dir = work_dir_with_catalog(&catalog("ledger/executor:v6", "kms"));
    fs::write(
        dir.path().join("config.xml"),
        r#"<configuration><folder id="blocks"/><folder id="proposals"/><folder id="txs"/><options/></configuration>"#,
    )
    .unwrap();
    let constants = ProvisionConstants::default();
    let config = ForgeConfig::default();
    let identities = MemoryIdentityGenerator::new();
    let devices = MemoryDeviceIdGenerator::new();

    let request = ClusterRequest {
        discovery_template: Some("config.xml".into()),
        ..local_request(2)
    };
    let err = Provisioner::new(&constants, &config, &identities, &devices)
        .run(&request, dir.path().to_path_buf())
        .unwrap_err();
    assert!(matches!(
        err,
        OpsError::Provision(ProvisionError::Configuration(_))
    ));
    let entries: Vec<PathBuf> = generated_entries(dir.path())
        .into_iter()
        .filter(|p| !p.ends_with("config.xml"))
        .collect();
    assert!(entries.is_empty(), "{entries:?}");
}

#[test]
fn monitored_state_db_cluster_exposes_every_container_port() {
    let dir = work_dir_with_catalog(&catalog("ledger/executor:chaincode_ext-v6", "kms"));
    let constants = ProvisionConstants::default();
    let config = ForgeConfig::default();
    let identities = MemoryIdentityGenerator::new();
    let devices = MemoryDeviceIdGenerator::new();

    let request = ClusterRequest {
        monitoring: true,
        ..local_request(2)
    };
    let summary = Provisioner::new(&constants, &config, &identities, &devices)
        .run(&request, dir.path().to_path_buf())
        .unwrap();

    let manifest = read(&summary.manifest_path);
    assert!(!manifest.contains("value: password"));
    let docs = from_yaml_stream(&manifest).unwrap();
    // shared service, then kms, network and state-db secrets, service and pod per node
    assert_eq!(docs.len(), 1 + 2 * 5);

    for node in ["test-chain-0", "test-chain-1"] {
        let service = docs
            .iter()
            .find_map(|d| match d {
                ManifestResource::Service(s) if s.metadata.name == node => Some(s),
                _ => None,
            })
            .unwrap();
        let pod = docs
            .iter()
            .find_map(|d| match d {
                ManifestResource::Pod(p) if p.metadata.name == node => Some(p),
                _ => None,
            })
            .unwrap();

        let declared: Vec<(u16, _)> = pod
            .container_ports()
            .map(|p| (p.container_port, p.protocol))
            .collect();
        let targets: Vec<(u16, _)> = service
            .spec
            .ports
            .iter()
            .map(|p| (p.target_port, p.protocol))
            .collect();
        assert_eq!(declared, targets, "{node}");

        for port in [5984, 9256, 9349, 7052, 7053] {
            assert!(
                service.spec.ports.iter().any(|p| p.target_port == port),
                "{node} does not expose {port}"
            );
        }
        assert!(
            docs.iter()
                .any(|d| d.kind() == "Secret" && d.name() == format!("{node}-state-db-secret"))
        );
    }
}
