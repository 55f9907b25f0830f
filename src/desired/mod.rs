//! Statically typed desired-state descriptors.
//!
//! Each resource kind has its own spec struct whose fields mirror the option
//! table accepted by the host. Documents are decoded with unknown options
//! rejected; checks that do not depend on live state run in
//! [`DesiredState::validate`], and the action-dependent checks (creation,
//! resize) run once the differ has classified the required action.

mod block_storage;
mod floating_ip;
mod network;
mod vm;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::model::ResourceKind;

pub use block_storage::BlockStorageSpec;
pub use floating_ip::{FloatingIpSpec, FloatingIpState};
pub use network::NetworkSpec;
pub use vm::{NewVm, OS_VERSIONS, VmLifecycle, VmSpec, VmState};

/// Provider data centres.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Jakarta 1.
    Jkt01,
    /// Jakarta 2.
    Jkt02,
    /// Jakarta 3.
    Jkt03,
    /// Singapore 1.
    Sgp01,
}

impl Location {
    /// Every supported location.
    pub const ALL: [Self; 4] = [Self::Jkt01, Self::Jkt02, Self::Jkt03, Self::Sgp01];

    /// Returns the path segment used by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jkt01 => "jkt01",
            Self::Jkt02 => "jkt02",
            Self::Jkt03 => "jkt03",
            Self::Sgp01 => "sgp01",
        }
    }

    /// Prefixes a resource path with this location.
    #[must_use]
    pub fn path(self, suffix: &str) -> String {
        format!("{}/{}", self.as_str(), suffix.trim_start_matches('/'))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = ReconcileError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|location| location.as_str() == value.trim())
            .ok_or_else(|| {
                ReconcileError::validation(
                    "location",
                    format!("expected one of jkt01, jkt02, jkt03, sgp01, got '{value}'"),
                )
            })
    }
}

/// Existence intent shared by every resource kind.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Existence {
    /// The resource should exist.
    #[default]
    Present,
    /// The resource should not exist.
    Absent,
}

impl Existence {
    /// Returns the option value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl fmt::Display for Existence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Existence {
    type Err = ReconcileError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(ReconcileError::validation(
                "state",
                format!("expected present or absent, got '{other}'"),
            )),
        }
    }
}

/// Credential that never appears in debug output or logs.
#[derive(Clone, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a plain-text secret.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plain-text secret for sending to the provider.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// A desired-state document for one resource.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DesiredState {
    /// A VPC network.
    Network(NetworkSpec),
    /// A virtual machine.
    Vm(VmSpec),
    /// A floating IPv4 address.
    FloatingIp(FloatingIpSpec),
    /// A block storage disk.
    BlockStorage(BlockStorageSpec),
}

impl DesiredState {
    /// Decodes a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] when the document is malformed,
    /// names an unknown kind, or carries an unknown option.
    pub fn from_json(document: &str) -> Result<Self, ReconcileError> {
        let state: Self = serde_json::from_str(document)
            .map_err(|err| ReconcileError::validation("document", err.to_string()))?;
        state.validate()?;
        Ok(state)
    }

    /// Kind of resource described.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Network(_) => ResourceKind::Network,
            Self::Vm(_) => ResourceKind::Vm,
            Self::FloatingIp(_) => ResourceKind::FloatingIp,
            Self::BlockStorage(_) => ResourceKind::BlockStorage,
        }
    }

    /// Runs the checks that do not depend on live state.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] naming the offending option.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        match self {
            Self::Network(spec) => spec.validate(),
            Self::Vm(spec) => spec.validate(),
            Self::FloatingIp(spec) => spec.validate(),
            Self::BlockStorage(spec) => spec.validate(),
        }
    }
}

pub(crate) fn require_name(field: &str, value: &str) -> Result<(), ReconcileError> {
    if value.trim().is_empty() {
        return Err(ReconcileError::validation(field, "must not be empty"));
    }
    Ok(())
}
