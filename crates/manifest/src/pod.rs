//! Per-node pod and its cluster-internal service.

use std::collections::BTreeMap;

use chainforge_core::{ExecutorKind, NodeIndex, ProvisionConstants, ServiceCatalog, ServiceRole};
use serde::{Deserialize, Serialize};

use crate::resource::{
    Container, ContainerPort, EnvVar, ObjectMeta, Pod, PodSpec, Service, ServicePort, ServiceSpec,
    ServiceType, Volume, VolumeMount,
};
use crate::secrets::{
    STATE_DB_PASSWORD_KEY, STATE_DB_USER_KEY, kms_secret_name, network_secret_name,
    state_db_secret_name,
};

/// Label carrying the chain name. Selects every node of a cluster.
pub const CHAIN_NAME_LABEL: &str = "app.kubernetes.io/chain-name";
/// Label carrying the node's host name. Selects a single node.
pub const CHAIN_NODE_LABEL: &str = "app.kubernetes.io/chain-node";

pub const DATA_VOLUME: &str = "datadir";
pub const KMS_SECRET_VOLUME: &str = "kms-key";
pub const NETWORK_SECRET_VOLUME: &str = "network-key";

pub const DATA_MOUNT_PATH: &str = "/data";
pub const KMS_SECRET_MOUNT_PATH: &str = "/kms";
pub const NETWORK_SECRET_MOUNT_PATH: &str = "/network";
pub const DISCOVERY_MOUNT_PATH: &str = "/var/syncthing";
pub const STATE_DB_MOUNT_PATH: &str = "/opt/couchdb/data";

pub const DISCOVERY_CONTAINER: &str = "syncthing";
pub const STATE_DB_CONTAINER: &str = "couchdb";
pub const MONITOR_PROCESS_CONTAINER: &str = "monitor-process";
pub const MONITOR_EXPORTER_CONTAINER: &str = "monitor-exporter";

/// Images of the containers that do not come from the service catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarImages {
    pub discovery: String,
    pub state_db: String,
    pub monitor_process: String,
    pub monitor_exporter: String,
}

impl Default for SidecarImages {
    fn default() -> Self {
        Self {
            discovery: "syncthing/syncthing:latest".to_owned(),
            state_db: "couchdb:3.1.1".to_owned(),
            monitor_process: "ncabatoff/process-exporter:latest".to_owned(),
            monitor_exporter: "chainforge/monitor-exporter:latest".to_owned(),
        }
    }
}

/// Labels identifying `node` of `chain_name`.
pub fn node_labels(chain_name: &str, node: NodeIndex) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CHAIN_NAME_LABEL.to_owned(), chain_name.to_owned()),
        (
            CHAIN_NODE_LABEL.to_owned(),
            chainforge_core::node_host_name(chain_name, node),
        ),
    ])
}

/// Data directory of a node inside the shared volume.
pub fn node_sub_path(chain_name: &str, node: NodeIndex) -> String {
    format!("{chain_name}/node{node}")
}

/// Builds the pod of one node.
#[derive(Debug, Clone)]
pub struct PodBuilder<'a> {
    pub chain_name: &'a str,
    pub catalog: &'a ServiceCatalog,
    pub constants: &'a ProvisionConstants,
    pub images: &'a SidecarImages,
    pub monitoring: bool,
}

impl PodBuilder<'_> {
    /// Assemble the pod of `node`, whose data lives on claim `claim_name`.
    pub fn build(&self, node: NodeIndex, claim_name: &str) -> Pod {
        let sub_path = node_sub_path(self.chain_name, node);
        let executor = self.catalog.executor_kind();

        let mut containers: Vec<Container> = ServiceRole::ALL
            .iter()
            .map(|role| self.catalog.service(*role))
            .map(|service| {
                let mut container = Container {
                    name: service.role.as_str().to_owned(),
                    image: service.image.clone(),
                    command: service.command.clone(),
                    working_dir: Some(DATA_MOUNT_PATH.to_owned()),
                    ports: self.role_ports(service.role, executor),
                    volume_mounts: vec![data_mount(DATA_MOUNT_PATH, sub_path.clone())],
                    ..Container::default()
                };
                match service.role {
                    ServiceRole::Kms => container
                        .volume_mounts
                        .push(secret_mount(KMS_SECRET_VOLUME, KMS_SECRET_MOUNT_PATH)),
                    ServiceRole::Network => container
                        .volume_mounts
                        .push(secret_mount(NETWORK_SECRET_VOLUME, NETWORK_SECRET_MOUNT_PATH)),
                    _ => {}
                }
                container
            })
            .collect();

        containers.push(self.discovery_container(&sub_path));

        if executor.needs_state_db() {
            containers.push(self.state_db_container(&sub_path, node));
        }

        if self.monitoring {
            containers.extend(self.monitor_containers());
        }

        Pod::new(
            ObjectMeta::named(chainforge_core::node_host_name(self.chain_name, node))
                .with_labels(node_labels(self.chain_name, node)),
            PodSpec {
                containers,
                volumes: vec![
                    Volume::from_claim(DATA_VOLUME, claim_name),
                    Volume::from_secret(
                        KMS_SECRET_VOLUME,
                        kms_secret_name(self.chain_name, node.get()),
                    ),
                    Volume::from_secret(
                        NETWORK_SECRET_VOLUME,
                        network_secret_name(self.chain_name, node.get()),
                    ),
                ],
            },
        )
    }

    fn role_ports(&self, role: ServiceRole, executor: ExecutorKind) -> Vec<ContainerPort> {
        let ports = &self.constants.ports;
        let mut declared = Vec::new();
        if role == ServiceRole::Network {
            declared.push(ContainerPort::tcp("ledger-p2p", ports.ledger_network));
        }
        declared.push(ContainerPort::tcp(role.as_str(), ports.service_port(role)));
        if role == ServiceRole::Executor && executor.has_chaincode() {
            declared.push(ContainerPort::tcp("chaincode", ports.chaincode));
            declared.push(ContainerPort::tcp("eventhub", ports.eventhub));
        }
        declared
    }

    fn discovery_container(&self, sub_path: &str) -> Container {
        let ports = &self.constants.ports;
        Container {
            name: DISCOVERY_CONTAINER.to_owned(),
            image: self.images.discovery.clone(),
            ports: vec![
                ContainerPort::tcp("sync-tcp", ports.discovery),
                ContainerPort::udp("sync-udp", ports.discovery),
                ContainerPort::tcp("sync-gui", ports.discovery_gui),
            ],
            volume_mounts: vec![data_mount(DISCOVERY_MOUNT_PATH, sub_path.to_owned())],
            ..Container::default()
        }
    }

    fn state_db_container(&self, sub_path: &str, node: NodeIndex) -> Container {
        let secret = state_db_secret_name(self.chain_name, node.get());
        Container {
            name: STATE_DB_CONTAINER.to_owned(),
            image: self.images.state_db.clone(),
            ports: vec![ContainerPort::tcp("state-db", self.constants.ports.state_db)],
            env: vec![
                EnvVar::from_secret("COUCHDB_USER", &secret, STATE_DB_USER_KEY),
                EnvVar::from_secret("COUCHDB_PASSWORD", &secret, STATE_DB_PASSWORD_KEY),
            ],
            volume_mounts: vec![data_mount(STATE_DB_MOUNT_PATH, format!("{sub_path}/couchdb"))],
            ..Container::default()
        }
    }

    fn monitor_containers(&self) -> [Container; 2] {
        let ports = &self.constants.ports;
        [
            Container {
                name: MONITOR_PROCESS_CONTAINER.to_owned(),
                image: self.images.monitor_process.clone(),
                ports: vec![ContainerPort::tcp("mon-process", ports.monitor_process)],
                ..Container::default()
            },
            Container {
                name: MONITOR_EXPORTER_CONTAINER.to_owned(),
                image: self.images.monitor_exporter.clone(),
                ports: vec![ContainerPort::tcp("mon-exporter", ports.monitor_exporter)],
                volume_mounts: vec![VolumeMount {
                    name: DATA_VOLUME.to_owned(),
                    mount_path: DATA_MOUNT_PATH.to_owned(),
                    sub_path: Some(self.chain_name.to_owned()),
                    read_only: true,
                }],
                ..Container::default()
            },
        ]
    }
}

/// Cluster-internal service exposing every container port of `pod`.
///
/// Service ports mirror the pod's container ports one to one, so every
/// declared port is reachable under the node's host name.
pub fn node_service(chain_name: &str, node: NodeIndex, pod: &Pod) -> Service {
    let labels = node_labels(chain_name, node);
    Service::new(
        ObjectMeta::named(chainforge_core::node_host_name(chain_name, node))
            .with_labels(labels.clone()),
        ServiceSpec {
            service_type: ServiceType::ClusterIP,
            selector: labels,
            ports: pod
                .container_ports()
                .map(|p| ServicePort {
                    name: p.name.clone(),
                    port: p.container_port,
                    target_port: p.container_port,
                    protocol: p.protocol,
                })
                .collect(),
        },
    )
}

fn data_mount(path: &str, sub_path: String) -> VolumeMount {
    VolumeMount {
        name: DATA_VOLUME.to_owned(),
        mount_path: path.to_owned(),
        sub_path: Some(sub_path),
        read_only: false,
    }
}

fn secret_mount(volume: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: volume.to_owned(),
        mount_path: path.to_owned(),
        sub_path: None,
        read_only: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainforge_core::ServiceEntry;
    use std::collections::HashSet;

    fn catalog(executor_image: &str) -> ServiceCatalog {
        let entries: Vec<ServiceEntry> = ServiceRole::ALL
            .iter()
            .map(|role| ServiceEntry {
                name: role.as_str().to_owned(),
                image: if *role == ServiceRole::Executor {
                    executor_image.to_owned()
                } else {
                    format!("ledger/{role}:v6")
                },
                command: vec![format!("{role}"), "run".to_owned()],
            })
            .collect();
        ServiceCatalog::validate(&entries).unwrap()
    }

    fn build(executor_image: &str, monitoring: bool) -> Pod {
        let catalog = catalog(executor_image);
        let constants = ProvisionConstants::default();
        let images = SidecarImages::default();
        PodBuilder {
            chain_name: "c",
            catalog: &catalog,
            constants: &constants,
            images: &images,
            monitoring,
        }
        .build(NodeIndex::new(1), "local-pvc")
    }

    fn container_names(pod: &Pod) -> Vec<&str> {
        pod.spec.containers.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn plain_pod_has_roles_and_sidecar() {
        let pod = build("ledger/executor:v6", false);
        assert_eq!(pod.metadata.name, "c-1");
        assert_eq!(
            container_names(&pod),
            [
                "network",
                "consensus",
                "executor",
                "storage",
                "controller",
                "kms",
                "syncthing"
            ]
        );
    }

    #[test]
    fn state_db_and_monitors_are_conditional() {
        let pod = build("ledger/executor:chaincode_ext-v6", true);
        let names = container_names(&pod);
        assert!(names.contains(&STATE_DB_CONTAINER));
        assert!(names.contains(&MONITOR_PROCESS_CONTAINER));
        assert!(names.contains(&MONITOR_EXPORTER_CONTAINER));

        let pod = build("ledger/executor:chaincode-v6", false);
        let names = container_names(&pod);
        assert!(!names.contains(&STATE_DB_CONTAINER));
        assert!(!names.contains(&MONITOR_PROCESS_CONTAINER));
        assert!(pod.container_ports().any(|p| p.name == "chaincode"));
    }

    #[test]
    fn container_port_names_are_unique() {
        let pod = build("ledger/executor:chaincode_ext-v6", true);
        let mut seen = HashSet::new();
        for port in pod.container_ports() {
            assert!(port.name.len() <= 15, "{}", port.name);
            assert!(seen.insert(port.name.clone()), "duplicate {}", port.name);
        }
    }

    #[test]
    fn secret_mounts_are_read_only() {
        let pod = build("ledger/executor:v6", false);
        for container in &pod.spec.containers {
            for mount in &container.volume_mounts {
                if mount.name == KMS_SECRET_VOLUME || mount.name == NETWORK_SECRET_VOLUME {
                    assert!(mount.read_only, "{} in {}", mount.name, container.name);
                }
            }
        }
        let kms = pod.spec.containers.iter().find(|c| c.name == "kms").unwrap();
        assert!(
            kms.volume_mounts
                .iter()
                .any(|m| m.mount_path == KMS_SECRET_MOUNT_PATH)
        );
    }

    #[test]
    fn data_mounts_are_namespaced() {
        let pod = build("ledger/executor:v6", false);
        let controller = pod
            .spec
            .containers
            .iter()
            .find(|c| c.name == "controller")
            .unwrap();
        let data = controller
            .volume_mounts
            .iter()
            .find(|m| m.name == DATA_VOLUME)
            .unwrap();
        assert_eq!(data.sub_path.as_deref(), Some("c/node1"));
        assert_eq!(data.mount_path, DATA_MOUNT_PATH);
    }

    #[test]
    fn service_mirrors_container_ports() {
        let pod = build("ledger/executor:chaincode_ext-v6", true);
        let service = node_service("c", NodeIndex::new(1), &pod);
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
        assert_eq!(declared, targets);
        assert_eq!(service.spec.selector, pod.metadata.labels);
        assert_eq!(service.spec.selector[CHAIN_NODE_LABEL], "c-1");
    }

    #[test]
    fn state_db_credentials_come_from_node_secret() {
        let pod = build("ledger/executor:chaincode_ext-v6", false);
        let couchdb = pod
            .spec
            .containers
            .iter()
            .find(|c| c.name == STATE_DB_CONTAINER)
            .unwrap();
        assert_eq!(couchdb.env.len(), 2);
        for var in &couchdb.env {
            assert!(var.value.is_none(), "{} has a literal value", var.name);
            let source = var.value_from.as_ref().unwrap();
            assert_eq!(source.secret_key_ref.name, "c-1-state-db-secret");
        }
        let yaml = serde_yaml_ng::to_string(&pod).unwrap();
        assert!(!yaml.contains("value: password"), "{yaml}");
    }
}
