//! Identifying keys accepted by the locator.

use std::fmt;

use crate::model::{FloatingIpRecord, VmRecord};

/// Identifies a VM.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VmKey {
    /// Informative name.
    Name(String),
    /// Provider identifier.
    Uuid(String),
}

impl VmKey {
    pub(crate) fn matches(&self, vm: &VmRecord) -> bool {
        match self {
            Self::Name(name) => vm.name == *name,
            Self::Uuid(uuid) => vm.uuid == *uuid,
        }
    }
}

impl fmt::Display for VmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Uuid(uuid) => write!(f, "uuid {uuid}"),
        }
    }
}

/// Identifies a floating IP.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FloatingIpKey {
    /// Informative name.
    Name(String),
    /// Private address the floating IP is routed to.
    PrivateIpv4(String),
    /// VM the floating IP is assigned to.
    VmUuid(String),
    /// Provider identifier.
    Uuid(String),
}

impl FloatingIpKey {
    pub(crate) fn matches(&self, ip: &FloatingIpRecord) -> bool {
        match self {
            Self::Name(name) => ip.name.as_deref() == Some(name.as_str()),
            Self::PrivateIpv4(address) => {
                ip.assigned_to_private_ip.as_deref() == Some(address.as_str())
            }
            Self::VmUuid(uuid) => ip.assigned_to.as_deref() == Some(uuid.as_str()),
            Self::Uuid(uuid) => ip.uuid == *uuid,
        }
    }
}

impl fmt::Display for FloatingIpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::PrivateIpv4(address) => write!(f, "assigned to {address}"),
            Self::VmUuid(uuid) => write!(f, "assigned to VM {uuid}"),
            Self::Uuid(uuid) => write!(f, "uuid {uuid}"),
        }
    }
}
