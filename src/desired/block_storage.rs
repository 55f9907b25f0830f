//! Desired state of a block storage disk.

use serde::Deserialize;

use super::{Existence, Location, require_name};
use crate::error::ReconcileError;

/// A disk attached to a named VM, identified by device name.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BlockStorageSpec {
    /// Device name (`vdb`, `vdc`, ...) or disk identifier.
    pub name: String,
    /// Data centre holding the disk.
    pub location: Location,
    /// VM the disk is attached to.
    pub vm_name: String,
    /// Size in GB; required to create the disk.
    #[serde(default)]
    pub size: Option<u32>,
    /// Whether the disk should exist.
    #[serde(default)]
    pub state: Existence,
}

impl BlockStorageSpec {
    /// Checks the options that do not depend on live state.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] when a name is blank or `size`
    /// is zero.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        require_name("name", &self.name)?;
        require_name("vm_name", &self.vm_name)?;
        if self.size == Some(0) {
            return Err(ReconcileError::validation("size", "must be greater than zero"));
        }
        Ok(())
    }

    /// Size required to create the disk.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] when `size` is missing.
    pub fn creation_size(&self) -> Result<u32, ReconcileError> {
        self.size
            .ok_or_else(|| ReconcileError::missing("size", "create block storage"))
    }
}
