//! Block storage classification.
//!
//! Disks are data-bearing: they only ever grow, and they are only removed
//! on an explicit `absent`.

use tracing::warn;

use super::{ActionKind, ActionPlan, PlanStep};
use crate::desired::{BlockStorageSpec, Existence};
use crate::error::ReconcileError;
use crate::model::{DiskSnapshot, VmSnapshot};

/// Primitive block storage operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BlockStorageAction {
    /// Create a disk and attach it to the VM.
    Create {
        /// VM identifier.
        vm_uuid: String,
        /// Size in GB.
        size: u32,
    },
    /// Grow an attached disk.
    Resize {
        /// VM identifier.
        vm_uuid: String,
        /// Disk identifier.
        disk_uuid: String,
        /// Current size in GB.
        from: u32,
        /// Requested size in GB.
        to: u32,
    },
    /// Detach the disk from the VM.
    Detach {
        /// VM identifier.
        vm_uuid: String,
        /// Disk identifier.
        disk_uuid: String,
    },
    /// Delete a detached disk.
    Delete {
        /// Disk identifier.
        disk_uuid: String,
    },
}

impl PlanStep for BlockStorageAction {
    fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Resize { .. } => ActionKind::Resize,
            Self::Detach { .. } => ActionKind::Detach,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    fn removes_resource(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// Classifies a disk attached to `vm`.
///
/// # Errors
///
/// Returns [`ReconcileError::Validation`] when a disk must be created without
/// a `size` or under a name other than the device name the provider will
/// assign, or when deleting the VM's primary disk is requested.
pub fn classify_block_storage(
    desired: &BlockStorageSpec,
    vm: &VmSnapshot,
    found: Option<&DiskSnapshot>,
) -> Result<ActionPlan<BlockStorageAction>, ReconcileError> {
    let plan = match (desired.state, found) {
        (Existence::Present, None) => {
            let size = desired.creation_size()?;
            let next = vm.next_disk_name();
            if next.as_deref() != Some(desired.name.as_str()) {
                return Err(ReconcileError::validation(
                    "name",
                    next.map_or_else(
                        || format!("VM {} has no free disk device name", vm.name),
                        |next| {
                            format!(
                                "a new disk on VM {} is named {next} by the provider, got '{}'",
                                vm.name, desired.name
                            )
                        },
                    ),
                ));
            }
            ActionPlan::single(BlockStorageAction::Create {
                vm_uuid: vm.uuid.clone(),
                size,
            })
        }
        (Existence::Present, Some(disk)) => match desired.size {
            Some(size) if size > disk.size => ActionPlan::single(BlockStorageAction::Resize {
                vm_uuid: vm.uuid.clone(),
                disk_uuid: disk.uuid.clone(),
                from: disk.size,
                to: size,
            }),
            Some(size) if size < disk.size => {
                warn!(
                    disk = %disk.name,
                    vm = %vm.name,
                    current = disk.size,
                    requested = size,
                    "refusing to shrink block storage"
                );
                ActionPlan::empty()
            }
            Some(_) | None => ActionPlan::empty(),
        },
        (Existence::Absent, Some(disk)) => {
            if disk.primary {
                return Err(ReconcileError::validation(
                    "name",
                    format!("{} is the primary disk of VM {}", disk.name, vm.name),
                ));
            }
            [
                BlockStorageAction::Detach {
                    vm_uuid: vm.uuid.clone(),
                    disk_uuid: disk.uuid.clone(),
                },
                BlockStorageAction::Delete {
                    disk_uuid: disk.uuid.clone(),
                },
            ]
            .into_iter()
            .collect()
        }
        (Existence::Absent, None) => ActionPlan::empty(),
    };
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::Location;
    use rstest::rstest;

    fn vm() -> VmSnapshot {
        VmSnapshot {
            uuid: String::from("vm-1"),
            name: String::from("web"),
            hostname: String::from("web"),
            disks: 20,
            disk_uuid: Some(String::from("disk-a")),
            vcpu: 1,
            ram: 1024,
            private_ipv4: None,
            public_ipv4: None,
            billing_account: None,
            status: String::from("running"),
            storage: vec![disk("vda", 20, true)],
        }
    }

    fn disk(name: &str, size: u32, primary: bool) -> DiskSnapshot {
        DiskSnapshot {
            uuid: format!("disk-{name}"),
            name: String::from(name),
            size,
            primary,
            vm_name: String::from("web"),
        }
    }

    fn spec(size: Option<u32>, state: Existence) -> BlockStorageSpec {
        BlockStorageSpec {
            name: String::from("vdb"),
            location: Location::Jkt01,
            vm_name: String::from("web"),
            size,
            state,
        }
    }

    #[rstest]
    #[case(Some(20), vec![])]
    #[case(Some(50), vec![ActionKind::Resize])]
    #[case(Some(10), vec![])]
    #[case(None, vec![])]
    fn existing_disk_only_grows(#[case] size: Option<u32>, #[case] expected: Vec<ActionKind>) {
        let found = disk("vdb", 20, false);
        let plan = classify_block_storage(&spec(size, Existence::Present), &vm(), Some(&found))
            .expect("classify");
        assert_eq!(plan.kinds(), expected);
    }

    #[test]
    fn missing_disk_is_created_with_size() {
        let plan = classify_block_storage(&spec(Some(30), Existence::Present), &vm(), None)
            .expect("classify");
        assert_eq!(
            plan.steps(),
            [BlockStorageAction::Create {
                vm_uuid: String::from("vm-1"),
                size: 30
            }]
        );
    }

    #[test]
    fn creation_requires_the_provider_device_name() {
        let desired = BlockStorageSpec {
            name: String::from("data"),
            ..spec(Some(30), Existence::Present)
        };

        let err = classify_block_storage(&desired, &vm(), None).expect_err("name mismatch");

        assert!(
            matches!(err, ReconcileError::Validation { ref field, ref reason }
                if field == "name" && reason.contains("vdb"))
        );
    }

    #[test]
    fn delete_detaches_first() {
        let found = disk("vdb", 20, false);
        let plan = classify_block_storage(&spec(None, Existence::Absent), &vm(), Some(&found))
            .expect("classify");
        assert_eq!(plan.labels(), ["detach", "delete"]);
    }

    #[test]
    fn primary_disk_is_never_deleted() {
        let found = disk("vda", 20, true);
        let err = classify_block_storage(&spec(None, Existence::Absent), &vm(), Some(&found))
            .expect_err("primary");
        assert!(matches!(err, ReconcileError::Validation { .. }));
    }

    #[test]
    fn absent_missing_disk_is_a_no_op() {
        let plan =
            classify_block_storage(&spec(None, Existence::Absent), &vm(), None).expect("classify");
        assert!(plan.is_empty());
    }
}
