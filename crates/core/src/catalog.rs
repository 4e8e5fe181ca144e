//! Service catalog parsing and completeness validation.
//!
//! A catalog file lists the container image and launch command for each of
//! the six ledger service roles:
//!
//! ```toml
//! [[services]]
//! name = "network"
//! image = "registry.example.com/network_p2p:v6"
//! command = ["network", "run", "-p", "50000"]
//! ```
//!
//! Completeness is checked with a multiplicative fingerprint: every role has a
//! distinct prime weight, and a catalog is complete only when the product of
//! the declared weights equals the product of all six. Unique factorization
//! makes the check exact for any multiset of roles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// One of the six service roles every node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    Network,
    Consensus,
    Executor,
    Storage,
    Controller,
    Kms,
}

impl ServiceRole {
    /// All roles in canonical order.
    pub const ALL: [ServiceRole; 6] = [
        ServiceRole::Network,
        ServiceRole::Consensus,
        ServiceRole::Executor,
        ServiceRole::Storage,
        ServiceRole::Controller,
        ServiceRole::Kms,
    ];

    /// Lower-case role name as used in catalog files and resource names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Consensus => "consensus",
            Self::Executor => "executor",
            Self::Storage => "storage",
            Self::Controller => "controller",
            Self::Kms => "kms",
        }
    }

    /// Parse a role name. Returns `None` for names outside the fixed set.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == name)
    }

    fn weight(self) -> u128 {
        match self {
            Self::Network => 2,
            Self::Consensus => 3,
            Self::Executor => 5,
            Self::Storage => 7,
            Self::Controller => 11,
            Self::Kms => 13,
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fingerprint of a complete catalog.
pub const COMPLETE_FINGERPRINT: u128 = 2 * 3 * 5 * 7 * 11 * 13;

/// Product of the role weights. `None` if the product overflows, which can
/// only happen for catalogs far larger than six entries.
pub fn catalog_fingerprint(roles: impl IntoIterator<Item = ServiceRole>) -> Option<u128> {
    roles
        .into_iter()
        .try_fold(1u128, |acc, role| acc.checked_mul(role.weight()))
}

/// A `[[services]]` entry exactly as written in the catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Role name.
    pub name: String,
    /// Container image reference.
    pub image: String,
    /// Launch command. Empty means the image's default entrypoint.
    #[serde(default)]
    pub command: Vec<String>,
}

/// The catalog file as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

impl CatalogFile {
    /// Parse a catalog file from TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self, ProvisionError> {
        toml::from_str(contents)
            .map_err(|e| ProvisionError::Serialization(format!("invalid service catalog: {e}")))
    }
}

/// What flavour of executor the catalog declares.
///
/// Resolved once from the executor image tag: a tag containing
/// `chaincode_ext` selects [`ExecutorKind::ChaincodeWithExternalStateDB`], any
/// other tag containing `chaincode` selects [`ExecutorKind::Chaincode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutorKind {
    Plain,
    Chaincode,
    ChaincodeWithExternalStateDB,
}

impl ExecutorKind {
    /// Resolve the executor kind from a container image reference.
    pub fn from_image(image: &str) -> Self {
        let tag = image_tag(image);
        if tag.contains("chaincode_ext") {
            Self::ChaincodeWithExternalStateDB
        } else if tag.contains("chaincode") {
            Self::Chaincode
        } else {
            Self::Plain
        }
    }

    /// Whether the executor exposes chaincode and event hub ports.
    pub fn has_chaincode(self) -> bool {
        matches!(self, Self::Chaincode | Self::ChaincodeWithExternalStateDB)
    }

    /// Whether a state database sidecar must run next to the executor.
    pub fn needs_state_db(self) -> bool {
        matches!(self, Self::ChaincodeWithExternalStateDB)
    }
}

/// Tag portion of an image reference, `latest` when absent.
fn image_tag(image: &str) -> &str {
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    let without_digest = last_segment.split('@').next().unwrap_or(last_segment);
    match without_digest.split_once(':') {
        Some((_, tag)) => tag,
        None => "latest",
    }
}

/// A validated service declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub role: ServiceRole,
    pub image: String,
    pub command: Vec<String>,
}

/// A catalog that declares every role exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: Vec<ServiceSpec>,
    executor_kind: ExecutorKind,
}

impl ServiceCatalog {
    /// Validate declared entries. Declaration order is kept.
    pub fn validate(entries: &[ServiceEntry]) -> Result<Self, ProvisionError> {
        let mut services = Vec::with_capacity(entries.len());
        for entry in entries {
            let role = ServiceRole::parse(&entry.name)
                .ok_or_else(|| catalog_error(format!("unknown service `{}`", entry.name)))?;
            services.push(ServiceSpec {
                role,
                image: entry.image.clone(),
                command: entry.command.clone(),
            });
        }

        let fingerprint = catalog_fingerprint(services.iter().map(|s| s.role));
        if fingerprint != Some(COMPLETE_FINGERPRINT) {
            return Err(catalog_error(describe_mismatch(&services)));
        }

        let executor_kind = services
            .iter()
            .find(|s| s.role == ServiceRole::Executor)
            .map_or(ExecutorKind::Plain, |s| ExecutorKind::from_image(&s.image));

        Ok(Self {
            services,
            executor_kind,
        })
    }

    /// Parse and validate a catalog file in one step.
    pub fn from_toml_str(contents: &str) -> Result<Self, ProvisionError> {
        Self::validate(&CatalogFile::from_toml_str(contents)?.services)
    }

    /// Services in declaration order.
    pub fn services(&self) -> &[ServiceSpec] {
        &self.services
    }

    /// Declaration of a single role.
    pub fn service(&self, role: ServiceRole) -> &ServiceSpec {
        self.services
            .iter()
            .find(|s| s.role == role)
            .expect("validated catalog declares every role")
    }

    pub fn executor_kind(&self) -> ExecutorKind {
        self.executor_kind
    }
}

fn catalog_error(detail: String) -> ProvisionError {
    ProvisionError::Catalog {
        detail,
        required: ServiceRole::ALL
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn describe_mismatch(services: &[ServiceSpec]) -> String {
    let mut parts = Vec::new();
    let missing: Vec<&str> = ServiceRole::ALL
        .iter()
        .filter(|role| !services.iter().any(|s| s.role == **role))
        .map(|role| role.as_str())
        .collect();
    if !missing.is_empty() {
        parts.push(format!("missing {}", missing.join(", ")));
    }
    let duplicated: Vec<&str> = ServiceRole::ALL
        .iter()
        .filter(|role| services.iter().filter(|s| s.role == **role).count() > 1)
        .map(|role| role.as_str())
        .collect();
    if !duplicated.is_empty() {
        parts.push(format!("duplicated {}", duplicated.join(", ")));
    }
    if parts.is_empty() {
        parts.push(format!("{} services declared", services.len()));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> ServiceEntry {
        ServiceEntry {
            name: name.to_owned(),
            image: format!("registry.example.com/{name}:v6.3.0"),
            command: vec![name.to_owned(), "run".to_owned()],
        }
    }

    fn entries(names: &[&str]) -> Vec<ServiceEntry> {
        names.iter().map(|n| entry(n)).collect()
    }

    #[test]
    fn accepts_all_six_roles() {
        let catalog = ServiceCatalog::validate(&entries(&[
            "network",
            "consensus",
            "executor",
            "storage",
            "controller",
            "kms",
        ]))
        .unwrap();
        assert_eq!(catalog.services().len(), 6);
        assert_eq!(catalog.executor_kind(), ExecutorKind::Plain);
    }

    #[test]
    fn accepts_any_order() {
        let catalog = ServiceCatalog::validate(&entries(&[
            "kms",
            "controller",
            "network",
            "storage",
            "executor",
            "consensus",
        ]))
        .unwrap();
        assert_eq!(catalog.services()[0].role, ServiceRole::Kms);
        assert_eq!(catalog.service(ServiceRole::Network).image, entry("network").image);
    }

    #[test]
    fn rejects_duplicate_in_place_of_missing() {
        let err = ServiceCatalog::validate(&entries(&[
            "network",
            "consensus",
            "executor",
            "storage",
            "controller",
            "network",
        ]))
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("missing kms"), "{msg}");
        assert!(msg.contains("duplicated network"), "{msg}");
        assert!(msg.contains("network, consensus, executor, storage, controller, kms"));
    }

    #[test]
    fn rejects_missing_role() {
        let err = ServiceCatalog::validate(&entries(&[
            "network",
            "consensus",
            "executor",
            "storage",
            "controller",
        ]))
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Catalog { .. }));
    }

    #[test]
    fn rejects_extra_role() {
        let err = ServiceCatalog::validate(&entries(&[
            "network",
            "consensus",
            "executor",
            "storage",
            "controller",
            "kms",
            "kms",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("duplicated kms"));
    }

    #[test]
    fn rejects_unknown_role() {
        let err = ServiceCatalog::validate(&entries(&["network", "gateway"])).unwrap_err();
        assert!(err.to_string().contains("unknown service `gateway`"));
    }

    #[test]
    fn rejects_swaps_that_fooled_decimal_weights() {
        // network*kms == consensus*executor under weights 10..60.
        let err = ServiceCatalog::validate(&entries(&[
            "consensus",
            "executor",
            "consensus",
            "storage",
            "controller",
            "executor",
        ]));
        assert!(err.is_err());
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let forward = catalog_fingerprint(ServiceRole::ALL);
        let backward = catalog_fingerprint(ServiceRole::ALL.into_iter().rev());
        assert_eq!(forward, Some(COMPLETE_FINGERPRINT));
        assert_eq!(forward, backward);
    }

    #[test]
    fn executor_kind_from_tag() {
        assert_eq!(
            ExecutorKind::from_image("citacloud/executor_evm:v6.3.0"),
            ExecutorKind::Plain
        );
        assert_eq!(
            ExecutorKind::from_image("registry:5000/executor:chaincode-v1"),
            ExecutorKind::Chaincode
        );
        assert_eq!(
            ExecutorKind::from_image("executor:chaincode_ext"),
            ExecutorKind::ChaincodeWithExternalStateDB
        );
        // Only the tag is inspected.
        assert_eq!(
            ExecutorKind::from_image("chaincode/executor:latest"),
            ExecutorKind::Plain
        );
        assert_eq!(ExecutorKind::from_image("executor"), ExecutorKind::Plain);
    }

    #[test]
    fn parses_catalog_file() {
        let toml = r#"
            [[services]]
            name = "network"
            image = "net:1"
            command = ["network", "run"]

            [[services]]
            name = "kms"
            image = "kms:1"
        "#;
        let file = CatalogFile::from_toml_str(toml).unwrap();
        assert_eq!(file.services.len(), 2);
        assert!(file.services[1].command.is_empty());
    }

    #[test]
    fn rejects_malformed_catalog_file() {
        let err = CatalogFile::from_toml_str("services = 3").unwrap_err();
        assert!(matches!(err, ProvisionError::Serialization(_)));
    }
}
