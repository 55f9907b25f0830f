//! VPC network snapshot.

use serde::{Deserialize, Serialize};

use super::de::opt_string;

/// A VPC network as listed by `network/networks`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NetworkSnapshot {
    /// Provider identifier.
    pub uuid: String,
    /// Network name, unique per location.
    pub name: String,
    /// CIDR assigned by the provider.
    #[serde(default, deserialize_with = "opt_string")]
    pub subnet: Option<String>,
    /// Whether this is the location's default network.
    #[serde(default)]
    pub is_default: bool,
}
