//! Live resource snapshots as reported by the provider.
//!
//! Snapshots are transient: they are fetched fresh for every reconciliation
//! and never persisted by the engine. Each kind decodes from the provider's
//! wire representation and serialises into the flat attribute map reported
//! back to the caller.

mod block_storage;
mod de;
mod floating_ip;
mod network;
mod vm;

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

pub use block_storage::DiskSnapshot;
pub use floating_ip::FloatingIpSnapshot;
pub use network::NetworkSnapshot;
pub use vm::{Sizing, VmSnapshot};

pub(crate) use floating_ip::FloatingIpRecord;
pub(crate) use vm::VmRecord;

/// Resource kinds managed by the engine.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// VPC network.
    Network,
    /// Virtual machine.
    Vm,
    /// Floating (public) IPv4 address.
    FloatingIp,
    /// Block storage disk attached to a VM.
    BlockStorage,
}

impl ResourceKind {
    /// Returns the human readable label used in logs and errors.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Vm => "VM",
            Self::FloatingIp => "floating IP",
            Self::BlockStorage => "block storage",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The provider's current representation of a managed resource.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LiveResource {
    /// A VPC network.
    Network(NetworkSnapshot),
    /// A virtual machine.
    Vm(VmSnapshot),
    /// A floating IPv4 address.
    FloatingIp(FloatingIpSnapshot),
    /// A block storage disk.
    BlockStorage(DiskSnapshot),
}

impl LiveResource {
    /// Returns the kind of the wrapped snapshot.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Network(_) => ResourceKind::Network,
            Self::Vm(_) => ResourceKind::Vm,
            Self::FloatingIp(_) => ResourceKind::FloatingIp,
            Self::BlockStorage(_) => ResourceKind::BlockStorage,
        }
    }

    /// Returns the provider identifier of the resource.
    #[must_use]
    pub fn uuid(&self) -> &str {
        match self {
            Self::Network(network) => &network.uuid,
            Self::Vm(vm) => &vm.uuid,
            Self::FloatingIp(ip) => &ip.uuid,
            Self::BlockStorage(disk) => &disk.uuid,
        }
    }

    /// Flattens the snapshot into the attribute map handed to downstream
    /// reconciliations.
    #[must_use]
    pub fn attributes(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => Map::new(),
        }
    }
}

impl From<NetworkSnapshot> for LiveResource {
    fn from(value: NetworkSnapshot) -> Self {
        Self::Network(value)
    }
}

impl From<VmSnapshot> for LiveResource {
    fn from(value: VmSnapshot) -> Self {
        Self::Vm(value)
    }
}

impl From<FloatingIpSnapshot> for LiveResource {
    fn from(value: FloatingIpSnapshot) -> Self {
        Self::FloatingIp(value)
    }
}

impl From<DiskSnapshot> for LiveResource {
    fn from(value: DiskSnapshot) -> Self {
        Self::BlockStorage(value)
    }
}
