//! Block storage disk snapshot.

use serde::{Deserialize, Serialize};

use super::de::lenient_u32;

/// A disk attached to a VM, as listed in the VM's `storage` array.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DiskSnapshot {
    /// Provider identifier.
    pub uuid: String,
    /// Device name assigned by the provider (`vda`, `vdb`, ...).
    #[serde(default)]
    pub name: String,
    /// Size in GB.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub size: u32,
    /// Whether this is the VM's boot disk.
    #[serde(default)]
    pub primary: bool,
    /// Name of the VM the disk is attached to. Filled in by the locator.
    #[serde(default)]
    pub vm_name: String,
}
