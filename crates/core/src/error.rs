use thiserror::Error;

use crate::topology::NodeIndex;

/// Errors raised while synthesizing a cluster configuration.
///
/// Every variant is fatal for the current generation run; none of them are
/// retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// The declared service catalog is not exactly the required role set.
    #[error("invalid service catalog: {detail}; required services are [{required}]")]
    Catalog {
        /// What was wrong with the declared set.
        detail: String,
        /// Comma-separated list of the required roles.
        required: String,
    },

    /// An external collaborator produced output in an unexpected format.
    #[error("unexpected {tool} output: {detail}")]
    CollaboratorOutput {
        /// Which collaborator produced the output.
        tool: &'static str,
        /// Description of the mismatch.
        detail: String,
    },

    /// A per-node argument list does not have one entry per node.
    #[error("{field} has {actual} entries but the cluster has {expected} nodes")]
    ArityMismatch {
        /// Name of the offending argument list.
        field: &'static str,
        /// Node count.
        expected: usize,
        /// Length of the supplied list.
        actual: usize,
    },

    /// Two nodes' externally exposed port blocks overlap.
    #[error(
        "port blocks of node {first} (base {first_port}) and node {second} (base {second_port}) \
         collide: base ports must differ by more than {max_offset}"
    )]
    PortCollision {
        /// Lower node index of the colliding pair.
        first: NodeIndex,
        /// Base port of `first`.
        first_port: u16,
        /// Higher node index of the colliding pair.
        second: NodeIndex,
        /// Base port of `second`.
        second_port: u16,
        /// Largest offset used inside a port block.
        max_offset: u16,
    },

    /// The run parameters are inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An artifact could not be serialized or parsed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_display_names_field() {
        let err = ProvisionError::ArityMismatch {
            field: "node_ports",
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "node_ports has 2 entries but the cluster has 3 nodes"
        );
    }

    #[test]
    fn collision_display_names_both_nodes() {
        let err = ProvisionError::PortCollision {
            first: NodeIndex::new(0),
            first_port: 30000,
            second: NodeIndex::new(1),
            second_port: 30003,
            max_offset: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("node 0 (base 30000)"));
        assert!(msg.contains("node 1 (base 30003)"));
    }
}
