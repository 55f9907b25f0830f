//! Floating IPv4 snapshot.

use serde::{Deserialize, Serialize};

use super::de::opt_string;

/// Wire representation of an entry in `network/ip_addresses`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct FloatingIpRecord {
    pub(crate) uuid: String,
    #[serde(default, deserialize_with = "opt_string")]
    pub(crate) name: Option<String>,
    pub(crate) address: String,
    #[serde(default, deserialize_with = "opt_string")]
    pub(crate) assigned_to: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub(crate) assigned_to_private_ip: Option<String>,
    #[serde(default)]
    pub(crate) enabled: bool,
}

/// A floating IPv4 address and its current assignment.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FloatingIpSnapshot {
    /// Provider identifier.
    pub uuid: String,
    /// Informative name, if one was given at creation.
    pub name: Option<String>,
    /// The public IPv4 address itself.
    pub public_ipv4: String,
    /// Identifier of the VM the address is assigned to.
    pub assigned_to_vm_uuid: Option<String>,
    /// Private address the public address is routed to.
    pub private_ipv4_address: Option<String>,
    /// Whether the provider reports the address as enabled.
    pub enabled: bool,
}

impl FloatingIpSnapshot {
    /// Whether the address is currently assigned to any VM.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.assigned_to_vm_uuid.is_some()
    }
}

impl From<FloatingIpRecord> for FloatingIpSnapshot {
    fn from(record: FloatingIpRecord) -> Self {
        Self {
            uuid: record.uuid,
            name: record.name,
            public_ipv4: record.address,
            assigned_to_vm_uuid: record.assigned_to,
            private_ipv4_address: record.assigned_to_private_ip,
            enabled: record.enabled,
        }
    }
}
