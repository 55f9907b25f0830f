//! Desired state of a floating IPv4 address.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::{Location, require_name};
use crate::error::ReconcileError;
use crate::locator::FloatingIpKey;

/// Existence and assignment intent for a floating IP.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FloatingIpState {
    /// The address should exist, assigned to `vm_name` when given.
    #[default]
    Present,
    /// The address should be released.
    Absent,
    /// The address should exist but not be assigned to any VM.
    #[serde(rename = "unassign")]
    Unassigned,
}

impl FloatingIpState {
    /// Returns the option value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Unassigned => "unassign",
        }
    }
}

impl fmt::Display for FloatingIpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FloatingIpState {
    type Err = ReconcileError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "unassign" => Ok(Self::Unassigned),
            other => Err(ReconcileError::validation(
                "state",
                format!("expected present, absent or unassign, got '{other}'"),
            )),
        }
    }
}

/// A floating IP located by name, by assigned private address or by
/// assigned VM.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FloatingIpSpec {
    /// Data centre holding the address.
    pub location: Location,
    /// Informative name; required to create the address.
    #[serde(default)]
    pub name: Option<String>,
    /// Private address the floating IP is routed to.
    #[serde(default)]
    pub private_ipv4: Option<String>,
    /// VM the floating IP is assigned to.
    #[serde(default)]
    pub vm_uuid: Option<String>,
    /// VM the floating IP should be assigned to.
    #[serde(default)]
    pub vm_name: Option<String>,
    /// Existence and assignment intent.
    #[serde(default)]
    pub state: FloatingIpState,
}

impl FloatingIpSpec {
    /// Builds a spec keyed by name.
    #[must_use]
    pub fn named(name: impl Into<String>, location: Location) -> Self {
        Self {
            location,
            name: Some(name.into()),
            private_ipv4: None,
            vm_uuid: None,
            vm_name: None,
            state: FloatingIpState::Present,
        }
    }

    /// Checks the options that do not depend on live state.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] when no lookup key is given, or
    /// when both `private_ipv4` and `vm_uuid` are.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.private_ipv4.is_some() && self.vm_uuid.is_some() {
            return Err(ReconcileError::validation(
                "private_ipv4",
                "mutually exclusive with vm_uuid",
            ));
        }
        if let Some(name) = &self.name {
            require_name("name", name)?;
        }
        if let Some(vm_name) = &self.vm_name {
            require_name("vm_name", vm_name)?;
        }
        self.key().map(|_| ())
    }

    /// Lookup key, by precedence: `name`, `private_ipv4`, `vm_uuid`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] when none is given.
    pub fn key(&self) -> Result<FloatingIpKey, ReconcileError> {
        self.name
            .clone()
            .map(FloatingIpKey::Name)
            .or_else(|| self.private_ipv4.clone().map(FloatingIpKey::PrivateIpv4))
            .or_else(|| self.vm_uuid.clone().map(FloatingIpKey::VmUuid))
            .ok_or_else(|| {
                ReconcileError::validation(
                    "name",
                    "one of name, private_ipv4 or vm_uuid is required",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn spec(
        name: Option<&str>,
        private_ipv4: Option<&str>,
        vm_uuid: Option<&str>,
    ) -> FloatingIpSpec {
        FloatingIpSpec {
            location: Location::Jkt01,
            name: name.map(String::from),
            private_ipv4: private_ipv4.map(String::from),
            vm_uuid: vm_uuid.map(String::from),
            vm_name: None,
            state: FloatingIpState::Present,
        }
    }

    #[rstest]
    #[case(
        spec(Some("edge"), Some("10.0.0.5"), None),
        FloatingIpKey::Name(String::from("edge"))
    )]
    #[case(
        spec(None, Some("10.0.0.5"), None),
        FloatingIpKey::PrivateIpv4(String::from("10.0.0.5"))
    )]
    #[case(spec(None, None, Some("vm-1")), FloatingIpKey::VmUuid(String::from("vm-1")))]
    fn key_follows_precedence(#[case] spec: FloatingIpSpec, #[case] expected: FloatingIpKey) {
        assert_eq!(spec.key().expect("key"), expected);
    }

    #[test]
    fn key_is_required() {
        assert!(spec(None, None, None).validate().is_err());
    }

    #[test]
    fn private_ip_and_vm_uuid_are_exclusive() {
        let err = spec(None, Some("10.0.0.5"), Some("vm-1"))
            .validate()
            .expect_err("exclusive");
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn unassign_state_decodes() {
        let spec: FloatingIpSpec = serde_json::from_str(
            r#"{"location": "sgp01", "name": "edge", "state": "unassign"}"#,
        )
        .expect("decode");
        assert_eq!(spec.state, FloatingIpState::Unassigned);
    }
}
