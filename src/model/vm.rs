//! Virtual machine snapshot and sizing.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::block_storage::DiskSnapshot;
use super::de::{lenient_u32, opt_string};

const STATUS_RUNNING: &str = "running";
const STATUS_STOPPED: &str = "stopped";

/// Wire representation of a VM entry in `user-resource/vm/list`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct VmRecord {
    pub(crate) uuid: String,
    pub(crate) name: String,
    #[serde(default)]
    hostname: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    vcpu: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    memory: u32,
    #[serde(default, deserialize_with = "opt_string")]
    pub(crate) private_ipv4: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    billing_account: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    storage: Vec<DiskSnapshot>,
}

/// CPU, memory and primary disk sizing of a VM.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Sizing {
    /// Number of virtual CPUs.
    pub vcpu: u32,
    /// Memory in MB.
    pub ram: u32,
    /// Primary disk size in GB.
    pub disks: u32,
}

impl fmt::Display for Sizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vCPU, {} MB RAM, {} GB disk",
            self.vcpu, self.ram, self.disks
        )
    }
}

/// A virtual machine together with its primary disk and public address.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VmSnapshot {
    /// Provider identifier.
    pub uuid: String,
    /// Informative name, unique per location.
    pub name: String,
    /// Machine hostname derived from the name by the provider.
    pub hostname: String,
    /// Primary disk size in GB.
    pub disks: u32,
    /// Identifier of the primary disk.
    pub disk_uuid: Option<String>,
    /// Number of virtual CPUs.
    pub vcpu: u32,
    /// Memory in MB.
    pub ram: u32,
    /// Private address on the attached network.
    pub private_ipv4: Option<String>,
    /// Floating IPv4 address assigned to the VM, if any.
    pub public_ipv4: Option<String>,
    /// Billing account paying for the VM.
    pub billing_account: Option<String>,
    /// Lifecycle status reported by the provider (`running`, `stopped`, ...).
    pub status: String,
    /// Every disk attached to the VM, primary included.
    #[serde(skip)]
    pub storage: Vec<DiskSnapshot>,
}

impl VmSnapshot {
    pub(crate) fn from_record(record: VmRecord, public_ipv4: Option<String>) -> Self {
        let VmRecord {
            uuid,
            name,
            hostname,
            vcpu,
            memory,
            private_ipv4,
            billing_account,
            status,
            storage,
        } = record;

        let attached: Vec<DiskSnapshot> = storage
            .into_iter()
            .map(|disk| DiskSnapshot {
                vm_name: name.clone(),
                ..disk
            })
            .collect();
        let primary = attached.iter().find(|disk| disk.primary);

        Self {
            disks: primary.map_or(0, |disk| disk.size),
            disk_uuid: primary.map(|disk| disk.uuid.clone()),
            uuid,
            name,
            hostname,
            vcpu,
            ram: memory,
            private_ipv4,
            public_ipv4,
            billing_account,
            status,
            storage: attached,
        }
    }

    /// Returns the current sizing of the VM.
    #[must_use]
    pub const fn sizing(&self) -> Sizing {
        Sizing {
            vcpu: self.vcpu,
            ram: self.ram,
            disks: self.disks,
        }
    }

    /// Whether the provider reports the VM as running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == STATUS_RUNNING
    }

    /// Whether the provider reports the VM as stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.status == STATUS_STOPPED
    }

    /// Finds an attached disk by device name.
    #[must_use]
    pub fn disk_named(&self, name: &str) -> Option<&DiskSnapshot> {
        self.storage.iter().find(|disk| disk.name == name)
    }

    /// Finds an attached disk by identifier.
    #[must_use]
    pub fn disk_by_uuid(&self, uuid: &str) -> Option<&DiskSnapshot> {
        self.storage.iter().find(|disk| disk.uuid == uuid)
    }

    /// Device name the provider gives the next disk attached to this VM:
    /// the first free `vda`..`vdz`.
    #[must_use]
    pub fn next_disk_name(&self) -> Option<String> {
        ('a'..='z')
            .map(|letter| format!("vd{letter}"))
            .find(|name| self.disk_named(name).is_none())
    }
}
