//! External collaborators consumed during cluster generation.
//!
//! Two capabilities are needed: a key-generation tool that issues account
//! identities ([`IdentityGenerator`]) and a sync daemon that issues discovery
//! device identifiers ([`DeviceIdGenerator`]). Both are synchronous; callers
//! invoke them strictly one at a time. Process-backed implementations live in
//! [`process`], in-memory ones in [`memory`].

pub mod device;
pub mod error;
pub mod identity;
pub mod memory;
pub mod process;

pub use device::{DEVICE_ID_MARKER, DeviceIdGenerator, parse_device_id};
pub use error::ToolError;
pub use identity::{IdentityGenerator, PASSPHRASE_FILE, parse_identity_output};
pub use memory::{MemoryDeviceIdGenerator, MemoryIdentityGenerator};
pub use process::{DIR_PLACEHOLDER, ProcessDeviceIdGenerator, ProcessIdentityGenerator};
