//! Desired state of a virtual machine.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::{Existence, Location, Secret, require_name};
use crate::error::ReconcileError;
use crate::model::Sizing;

/// Operating system images and the versions each accepts.
pub const OS_VERSIONS: &[(&str, &[&str])] = &[
    ("almalinux", &["9.x", "8.x"]),
    ("bsd", &["freebsd_12.2"]),
    ("centos", &["9.x"]),
    ("cloudlinux", &["8.4", "7.9"]),
    ("debian", &["11", "12"]),
    ("fedora", &["32", "34", "36"]),
    ("opensuse", &["15.3"]),
    ("oracle", &["9.x"]),
    ("rhel", &["server_7.9", "server_8.4"]),
    ("rocky", &["linux_8.4", "9.x"]),
    ("ubuntu", &["20.04-lts", "21.04", "22.04-lts", "24.04-lts"]),
    ("vzlinux", &["8.x"]),
    ("windows", &["2019"]),
];

const MAX_USERNAME_LEN: usize = 25;
const MIN_PASSWORD_LEN: usize = 8;

/// Lifecycle intents that only make sense for a VM.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VmLifecycle {
    /// The VM should be running.
    Active,
    /// The VM should be stopped.
    Inactive,
    /// The VM should carry the requested sizing.
    Resize,
}

/// VM `state` option, separating existence from lifecycle intent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VmState {
    /// `present` or `absent`.
    Exists(Existence),
    /// `active`, `inactive` or `resize`.
    Lifecycle(VmLifecycle),
}

impl Default for VmState {
    fn default() -> Self {
        Self::Exists(Existence::Present)
    }
}

impl VmState {
    /// Returns the option value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exists(existence) => existence.as_str(),
            Self::Lifecycle(VmLifecycle::Active) => "active",
            Self::Lifecycle(VmLifecycle::Inactive) => "inactive",
            Self::Lifecycle(VmLifecycle::Resize) => "resize",
        }
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VmState {
    type Err = ReconcileError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "present" => Ok(Self::Exists(Existence::Present)),
            "absent" => Ok(Self::Exists(Existence::Absent)),
            "active" => Ok(Self::Lifecycle(VmLifecycle::Active)),
            "inactive" => Ok(Self::Lifecycle(VmLifecycle::Inactive)),
            "resize" => Ok(Self::Lifecycle(VmLifecycle::Resize)),
            other => Err(ReconcileError::validation(
                "state",
                format!("expected present, absent, active, inactive or resize, got '{other}'"),
            )),
        }
    }
}

impl<'de> Deserialize<'de> for VmState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A virtual machine identified by name within a location.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VmSpec {
    /// VM name.
    pub name: String,
    /// Data centre holding the VM.
    pub location: Location,
    /// Network the VM is attached to on creation.
    #[serde(default)]
    pub network_name: Option<String>,
    /// Operating system image.
    #[serde(default)]
    pub os_name: Option<String>,
    /// Version of the operating system image.
    #[serde(default)]
    pub os_version: Option<String>,
    /// Number of virtual CPUs.
    #[serde(default)]
    pub vcpu: Option<u32>,
    /// Memory in MB.
    #[serde(default)]
    pub ram: Option<u32>,
    /// Primary disk size in GB.
    #[serde(default)]
    pub disks: Option<u32>,
    /// Login created on first boot.
    #[serde(default)]
    pub username: Option<String>,
    /// Password of `username`.
    #[serde(default)]
    pub password: Option<Secret>,
    /// Release the VM's floating IP before deleting it.
    #[serde(default)]
    pub remove_public_ipv4: bool,
    /// Existence or lifecycle intent.
    #[serde(default)]
    pub state: VmState,
}

/// Validated parameters for a VM creation call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewVm {
    /// VM name.
    pub name: String,
    /// Network to attach, by name.
    pub network_name: String,
    /// Operating system image.
    pub os_name: String,
    /// Operating system version.
    pub os_version: String,
    /// Initial sizing.
    pub sizing: Sizing,
    /// Login created on first boot.
    pub username: String,
    /// Password of `username`.
    pub password: Secret,
}

impl VmSpec {
    /// Builds a spec with only the identifying options set.
    #[must_use]
    pub fn named(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
            network_name: None,
            os_name: None,
            os_version: None,
            vcpu: None,
            ram: None,
            disks: None,
            username: None,
            password: None,
            remove_public_ipv4: false,
            state: VmState::default(),
        }
    }

    /// Checks the options that do not depend on live state.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] when `name` is blank or a given
    /// sizing field is zero.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        require_name("name", &self.name)?;
        for (field, value) in [("vcpu", self.vcpu), ("ram", self.ram), ("disks", self.disks)] {
            if value == Some(0) {
                return Err(ReconcileError::validation(field, "must be greater than zero"));
            }
        }
        Ok(())
    }

    /// Whether the intent creates the VM when it does not exist.
    #[must_use]
    pub const fn creates_when_absent(&self) -> bool {
        matches!(
            self.state,
            VmState::Exists(Existence::Present) | VmState::Lifecycle(VmLifecycle::Active)
        )
    }

    /// Overlays the given sizing fields on `current`.
    #[must_use]
    pub fn sizing_over(&self, current: Sizing) -> Sizing {
        Sizing {
            vcpu: self.vcpu.unwrap_or(current.vcpu),
            ram: self.ram.unwrap_or(current.ram),
            disks: self.disks.unwrap_or(current.disks),
        }
    }

    /// Sizing required by `state = resize`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] when `vcpu`, `ram` or `disks`
    /// is missing.
    pub fn target_sizing(&self) -> Result<Sizing, ReconcileError> {
        Ok(Sizing {
            vcpu: required(self.vcpu, "vcpu", "resize VM")?,
            ram: required(self.ram, "ram", "resize VM")?,
            disks: required(self.disks, "disks", "resize VM")?,
        })
    }

    /// Validates every option a creation call needs.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] naming the first missing or
    /// malformed option.
    pub fn new_vm(&self) -> Result<NewVm, ReconcileError> {
        const ACTION: &str = "create VM";
        let network_name = required(self.network_name.clone(), "network_name", ACTION)?;
        let os_name = required(self.os_name.clone(), "os_name", ACTION)?;
        let os_version = required(self.os_version.clone(), "os_version", ACTION)?;
        let sizing = Sizing {
            vcpu: required(self.vcpu, "vcpu", ACTION)?,
            ram: required(self.ram, "ram", ACTION)?,
            disks: required(self.disks, "disks", ACTION)?,
        };
        let username = required(self.username.clone(), "username", ACTION)?;
        let password = required(self.password.clone(), "password", ACTION)?;

        check_os(&os_name, &os_version)?;
        check_username(&username)?;
        check_password(password.expose())?;

        Ok(NewVm {
            name: self.name.clone(),
            network_name,
            os_name,
            os_version,
            sizing,
            username,
            password,
        })
    }
}

fn required<T>(value: Option<T>, field: &str, action: &str) -> Result<T, ReconcileError> {
    value.ok_or_else(|| ReconcileError::missing(field, action))
}

fn check_os(os_name: &str, os_version: &str) -> Result<(), ReconcileError> {
    let Some((_, versions)) = OS_VERSIONS.iter().find(|(name, _)| *name == os_name) else {
        let names: Vec<&str> = OS_VERSIONS.iter().map(|(name, _)| *name).collect();
        return Err(ReconcileError::validation(
            "os_name",
            format!("expected one of {}, got '{os_name}'", names.join(", ")),
        ));
    };
    if versions.contains(&os_version) {
        return Ok(());
    }
    Err(ReconcileError::validation(
        "os_version",
        format!(
            "{os_name} accepts {}, got '{os_version}'",
            versions.join(", ")
        ),
    ))
}

fn check_username(username: &str) -> Result<(), ReconcileError> {
    let mut chars = username.chars();
    let starts_well = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
    let rest_ok = chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if starts_well && rest_ok && username.len() <= MAX_USERNAME_LEN {
        return Ok(());
    }
    Err(ReconcileError::validation(
        "username",
        "must start with a letter or underscore, contain only ASCII letters, digits, \
         underscores or hyphens, and be at most 25 characters",
    ))
}

fn check_password(password: &str) -> Result<(), ReconcileError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_lower = password.chars().any(|ch| ch.is_ascii_lowercase());
    let has_upper = password.chars().any(|ch| ch.is_ascii_uppercase());
    let has_digit = password.chars().any(|ch| ch.is_ascii_digit());
    if long_enough && has_lower && has_upper && has_digit {
        return Ok(());
    }
    Err(ReconcileError::validation(
        "password",
        "must be at least 8 characters with a lowercase letter, an uppercase letter and a digit",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn creatable() -> VmSpec {
        VmSpec {
            network_name: Some(String::from("backend")),
            os_name: Some(String::from("ubuntu")),
            os_version: Some(String::from("22.04-lts")),
            vcpu: Some(2),
            ram: Some(2048),
            disks: Some(20),
            username: Some(String::from("deploy")),
            password: Some(Secret::new("Passw0rdX")),
            ..VmSpec::named("web", Location::Jkt01)
        }
    }

    #[rstest]
    #[case("present", VmState::Exists(Existence::Present))]
    #[case("absent", VmState::Exists(Existence::Absent))]
    #[case("active", VmState::Lifecycle(VmLifecycle::Active))]
    #[case("inactive", VmState::Lifecycle(VmLifecycle::Inactive))]
    #[case("resize", VmState::Lifecycle(VmLifecycle::Resize))]
    fn state_parses_all_intents(#[case] raw: &str, #[case] expected: VmState) {
        assert_eq!(raw.parse::<VmState>().expect("parse"), expected);
        assert_eq!(expected.as_str(), raw);
    }

    #[test]
    fn state_defaults_to_present() {
        let spec: VmSpec =
            serde_json::from_str(r#"{"name": "web", "location": "jkt01"}"#).expect("decode");
        assert_eq!(spec.state, VmState::Exists(Existence::Present));
        assert!(!spec.remove_public_ipv4);
    }

    #[rstest]
    fn complete_spec_yields_new_vm(creatable: VmSpec) {
        let new_vm = creatable.new_vm().expect("valid");
        assert_eq!(new_vm.sizing, Sizing { vcpu: 2, ram: 2048, disks: 20 });
        assert_eq!(new_vm.network_name, "backend");
    }

    #[rstest]
    fn missing_password_is_reported_by_name(creatable: VmSpec) {
        let spec = VmSpec {
            password: None,
            ..creatable
        };
        let err = spec.new_vm().expect_err("missing password");
        assert_eq!(err, ReconcileError::missing("password", "create VM"));
    }

    #[rstest]
    fn os_version_must_belong_to_os(creatable: VmSpec) {
        let spec = VmSpec {
            os_version: Some(String::from("12")),
            ..creatable
        };
        let err = spec.new_vm().expect_err("debian version on ubuntu");
        assert!(matches!(
            err,
            ReconcileError::Validation { ref field, .. } if field == "os_version"
        ));
    }

    #[rstest]
    #[case("deploy", true)]
    #[case("_svc-01", true)]
    #[case("1admin", false)]
    #[case("bad name", false)]
    #[case("abcdefghijklmnopqrstuvwxyz", false)]
    fn username_rules(#[case] username: &str, #[case] valid: bool) {
        assert_eq!(check_username(username).is_ok(), valid);
    }

    #[rstest]
    #[case("Passw0rdX", true)]
    #[case("Pa55word", true)]
    #[case("password1", false)]
    #[case("PASSWORD1", false)]
    #[case("Pw0rd", false)]
    fn password_rules(#[case] password: &str, #[case] valid: bool) {
        assert_eq!(check_password(password).is_ok(), valid);
    }

    #[test]
    fn resize_requires_all_sizing_fields() {
        let spec = VmSpec {
            vcpu: Some(4),
            ram: Some(4096),
            ..VmSpec::named("web", Location::Jkt01)
        };
        assert_eq!(
            spec.target_sizing(),
            Err(ReconcileError::missing("disks", "resize VM"))
        );
    }

    #[test]
    fn sizing_over_keeps_unspecified_fields() {
        let spec = VmSpec {
            ram: Some(4096),
            ..VmSpec::named("web", Location::Jkt01)
        };
        let current = Sizing { vcpu: 2, ram: 2048, disks: 20 };
        assert_eq!(
            spec.sizing_over(current),
            Sizing { vcpu: 2, ram: 4096, disks: 20 }
        );
    }

    #[test]
    fn zero_sizing_is_rejected_up_front() {
        let spec = VmSpec {
            vcpu: Some(0),
            ..VmSpec::named("web", Location::Jkt01)
        };
        assert!(spec.validate().is_err());
    }
}
