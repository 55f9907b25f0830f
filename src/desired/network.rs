//! Desired state of a VPC network.

use serde::Deserialize;

use super::{Existence, Location, require_name};
use crate::error::ReconcileError;

/// A VPC network identified by name within a location.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NetworkSpec {
    /// Network name.
    pub name: String,
    /// Data centre holding the network.
    pub location: Location,
    /// Whether the network should exist.
    #[serde(default)]
    pub state: Existence,
}

impl NetworkSpec {
    /// Builds a spec for a network that should exist.
    #[must_use]
    pub fn present(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
            state: Existence::Present,
        }
    }

    /// Returns the spec with another existence intent.
    #[must_use]
    pub const fn with_state(mut self, state: Existence) -> Self {
        self.state = state;
        self
    }

    /// Checks the options that do not depend on live state.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] when `name` is blank.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        require_name("name", &self.name)
    }
}
