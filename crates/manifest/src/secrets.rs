//! Per-node secrets: the key-service passphrase and the network identity key.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rand_core::{OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ManifestError;
use crate::resource::{ObjectMeta, Secret};

/// Data key of the key-service secret.
pub const KMS_SECRET_KEY: &str = "key_file";
/// Data key of the network secret.
pub const NETWORK_SECRET_KEY: &str = "network-key";
/// Data keys of the state database secret.
pub const STATE_DB_USER_KEY: &str = "username";
pub const STATE_DB_PASSWORD_KEY: &str = "password";
/// Administrator account created in the state database.
pub const STATE_DB_USER: &str = "admin";

pub fn kms_secret_name(chain_name: &str, node: usize) -> String {
    format!("{chain_name}-{node}-kms-secret")
}

pub fn network_secret_name(chain_name: &str, node: usize) -> String {
    format!("{chain_name}-{node}-network-secret")
}

pub fn state_db_secret_name(chain_name: &str, node: usize) -> String {
    format!("{chain_name}-{node}-state-db-secret")
}

/// A 32-byte network identity key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct NetworkKey([u8; 32]);

impl NetworkKey {
    /// Draw a fresh key from the operating system.
    pub fn generate() -> Result<Self, ManifestError> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| ManifestError::Entropy {
                purpose: "network key",
                detail: e.to_string(),
            })?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// `0x`-prefixed lowercase hex, the form the network service reads.
    pub fn to_prefixed_hex(&self) -> SecretString {
        SecretString::new(format!("0x{}", hex::encode(self.0)))
    }
}

impl fmt::Debug for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NetworkKey([REDACTED])")
    }
}

/// Draw a random administrator password for a node's state database.
pub fn generate_state_db_password() -> Result<SecretString, ManifestError> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| ManifestError::Entropy {
            purpose: "state database password",
            detail: e.to_string(),
        })?;
    let password = SecretString::new(hex::encode(bytes));
    bytes.zeroize();
    Ok(password)
}

/// Secret holding the key-service passphrase of one node.
pub fn kms_secret(
    chain_name: &str,
    node: usize,
    labels: BTreeMap<String, String>,
    password: &SecretString,
) -> Secret {
    Secret::opaque(
        ObjectMeta::named(kms_secret_name(chain_name, node)).with_labels(labels),
        BTreeMap::from([(
            KMS_SECRET_KEY.to_owned(),
            B64.encode(password.expose_secret()),
        )]),
    )
}

/// Secret holding the network identity key of one node.
pub fn network_secret(
    chain_name: &str,
    node: usize,
    labels: BTreeMap<String, String>,
    key: &NetworkKey,
) -> Secret {
    Secret::opaque(
        ObjectMeta::named(network_secret_name(chain_name, node)).with_labels(labels),
        BTreeMap::from([(
            NETWORK_SECRET_KEY.to_owned(),
            B64.encode(key.to_prefixed_hex().expose_secret()),
        )]),
    )
}

/// Secret holding the state database credentials of one node.
pub fn state_db_secret(
    chain_name: &str,
    node: usize,
    labels: BTreeMap<String, String>,
    password: &SecretString,
) -> Secret {
    Secret::opaque(
        ObjectMeta::named(state_db_secret_name(chain_name, node)).with_labels(labels),
        BTreeMap::from([
            (STATE_DB_USER_KEY.to_owned(), B64.encode(STATE_DB_USER)),
            (
                STATE_DB_PASSWORD_KEY.to_owned(),
                B64.encode(password.expose_secret()),
            ),
        ]),
    )
}
