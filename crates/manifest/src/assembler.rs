//! Composes the deployment manifest of a whole cluster.

use std::collections::BTreeMap;

use chainforge_core::{
    ExposureProfile, NodeIndex, PortAllocator, PortBlock, ProvisionConstants, ProvisionError,
    ServiceCatalog,
};
use secrecy::SecretString;
use tracing::debug;

use crate::error::ManifestError;
use crate::pod::{CHAIN_NAME_LABEL, PodBuilder, SidecarImages, node_labels, node_service};
use crate::resource::{
    ManifestResource, ObjectMeta, Protocol, Service, ServicePort, ServiceSpec, ServiceType,
};
use crate::secrets::{
    NetworkKey, generate_state_db_password, kms_secret, network_secret, state_db_secret,
};

/// Annotation key used for load-balancer tokens unless configured otherwise.
pub const DEFAULT_LB_ANNOTATION: &str = "kubernetes.digitalocean.com/load-balancer-id";

/// Name of the shared RPC service of a co-located cluster.
pub fn shared_rpc_service_name(chain_name: &str) -> String {
    format!("{chain_name}-node-port")
}

/// Name of a federated node's load balancer service.
pub fn load_balancer_name(chain_name: &str, node: NodeIndex) -> String {
    format!("{chain_name}-{node}-lb")
}

/// Mode-specific inputs of the assembler.
#[derive(Debug, Clone, Copy)]
pub enum ClusterLayout<'a> {
    /// Every node shares one claim and one RPC entry point.
    Local { claim_name: &'a str },
    /// Every node has its own claim and its own load balancer.
    Multi(MultiLayout<'a>),
}

/// Per-node inputs of a federated cluster, all indexed by node.
#[derive(Debug, Clone, Copy)]
pub struct MultiLayout<'a> {
    pub port_blocks: &'a [PortBlock],
    pub claim_names: &'a [String],
    pub lb_tokens: &'a [String],
    pub annotation_key: &'a str,
}

/// Builds the ordered resource list of a cluster.
#[derive(Debug, Clone)]
pub struct ManifestAssembler<'a> {
    pub chain_name: &'a str,
    pub catalog: &'a ServiceCatalog,
    pub constants: &'a ProvisionConstants,
    pub images: &'a SidecarImages,
    pub monitoring: bool,
}

impl ManifestAssembler<'_> {
    /// Exposure profile matching the pods this assembler builds.
    pub fn exposure_profile(&self) -> ExposureProfile {
        ExposureProfile {
            monitoring: self.monitoring,
            executor: self.catalog.executor_kind(),
        }
    }

    /// Assemble the manifest with freshly generated network keys.
    pub fn assemble(
        &self,
        layout: ClusterLayout<'_>,
        kms_passwords: &[SecretString],
    ) -> Result<Vec<ManifestResource>, ManifestError> {
        self.assemble_with_keys(layout, kms_passwords, NetworkKey::generate)
    }

    /// Assemble the manifest, drawing one network key per node from `next_key`.
    ///
    /// The node count is the number of passphrases. Documents are ordered:
    /// the shared RPC service (local clusters), then for each node its
    /// secrets, its services and finally its pod.
    pub fn assemble_with_keys(
        &self,
        layout: ClusterLayout<'_>,
        kms_passwords: &[SecretString],
        mut next_key: impl FnMut() -> Result<NetworkKey, ManifestError>,
    ) -> Result<Vec<ManifestResource>, ManifestError> {
        let node_count = kms_passwords.len();
        if let ClusterLayout::Multi(multi) = &layout {
            check_arity("node_ports", node_count, multi.port_blocks.len())?;
            check_arity("pvc_names", node_count, multi.claim_names.len())?;
            check_arity("lb_tokens", node_count, multi.lb_tokens.len())?;
        }

        let pods = PodBuilder {
            chain_name: self.chain_name,
            catalog: self.catalog,
            constants: self.constants,
            images: self.images,
            monitoring: self.monitoring,
        };

        let needs_state_db = self.catalog.executor_kind().needs_state_db();
        let mut resources = Vec::new();
        if let ClusterLayout::Local { .. } = layout {
            resources.push(ManifestResource::Service(self.shared_rpc_service()));
        }

        for (node, password) in NodeIndex::range(node_count).zip(kms_passwords) {
            let labels = node_labels(self.chain_name, node);
            let network_key = next_key()?;

            resources.push(ManifestResource::Secret(kms_secret(
                self.chain_name,
                node.get(),
                labels.clone(),
                password,
            )));
            resources.push(ManifestResource::Secret(network_secret(
                self.chain_name,
                node.get(),
                labels.clone(),
                &network_key,
            )));
            if needs_state_db {
                resources.push(ManifestResource::Secret(state_db_secret(
                    self.chain_name,
                    node.get(),
                    labels,
                    &generate_state_db_password()?,
                )));
            }

            let pod = match &layout {
                ClusterLayout::Local { claim_name } => pods.build(node, claim_name),
                ClusterLayout::Multi(multi) => pods.build(node, &multi.claim_names[node.get()]),
            };
            resources.push(ManifestResource::Service(node_service(
                self.chain_name,
                node,
                &pod,
            )));
            if let ClusterLayout::Multi(multi) = &layout {
                resources.push(ManifestResource::Service(self.load_balancer_service(
                    node,
                    &multi.port_blocks[node.get()],
                    multi.annotation_key,
                    &multi.lb_tokens[node.get()],
                )));
            }
            resources.push(ManifestResource::Pod(pod));

            debug!(chain = self.chain_name, node = node.get(), "node resources assembled");
        }

        Ok(resources)
    }

    fn shared_rpc_service(&self) -> Service {
        let rpc_port =
            PortAllocator::new(&self.constants.ports, self.exposure_profile()).shared_rpc_port();
        Service::new(
            ObjectMeta::named(shared_rpc_service_name(self.chain_name)),
            ServiceSpec {
                service_type: ServiceType::NodePort,
                selector: BTreeMap::from([(
                    CHAIN_NAME_LABEL.to_owned(),
                    self.chain_name.to_owned(),
                )]),
                ports: vec![ServicePort {
                    name: "rpc".to_owned(),
                    port: rpc_port,
                    target_port: rpc_port,
                    protocol: Protocol::Tcp,
                }],
            },
        )
    }

    fn load_balancer_service(
        &self,
        node: NodeIndex,
        block: &PortBlock,
        annotation_key: &str,
        token: &str,
    ) -> Service {
        let labels = node_labels(self.chain_name, node);
        Service::new(
            ObjectMeta::named(load_balancer_name(self.chain_name, node))
                .with_labels(labels.clone())
                .with_annotation(annotation_key, token),
            ServiceSpec {
                service_type: ServiceType::LoadBalancer,
                selector: labels,
                ports: block
                    .ports
                    .iter()
                    .map(|p| ServicePort {
                        name: p.kind.port_name().to_owned(),
                        port: p.external,
                        target_port: p.target,
                        protocol: Protocol::Tcp,
                    })
                    .collect(),
            },
        )
    }
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
