//! VM classification.
//!
//! States: absent, running, stopped. Existence intents create or delete;
//! lifecycle intents power-cycle or resize an existing VM and are no-ops
//! when the VM is absent (except `active`, which creates it). OS image
//! changes are never diffed.

use super::{ActionKind, ActionPlan, PlanStep};
use crate::desired::{Existence, NewVm, VmLifecycle, VmSpec, VmState};
use crate::error::ReconcileError;
use crate::model::{NetworkSnapshot, ResourceKind, Sizing, VmSnapshot};

/// Primitive VM operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VmAction {
    /// Create the VM on the resolved network.
    Create {
        /// Validated creation parameters.
        vm: Box<NewVm>,
        /// Identifier of the network resolved from `network_name`.
        network_uuid: String,
    },
    /// Change CPU, memory and primary disk sizing.
    Resize {
        /// VM identifier.
        uuid: String,
        /// Primary disk identifier.
        disk_uuid: Option<String>,
        /// Current sizing.
        from: Sizing,
        /// Requested sizing.
        to: Sizing,
    },
    /// Start the VM.
    PowerOn {
        /// VM identifier.
        uuid: String,
    },
    /// Stop the VM.
    PowerOff {
        /// VM identifier.
        uuid: String,
    },
    /// Release the floating IP assigned to the VM.
    ReleasePublicIp {
        /// Public address to release.
        address: String,
    },
    /// Delete the VM.
    Delete {
        /// VM identifier.
        uuid: String,
    },
}

impl PlanStep for VmAction {
    fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Resize { .. } => ActionKind::Resize,
            Self::PowerOn { .. } => ActionKind::PowerOn,
            Self::PowerOff { .. } => ActionKind::PowerOff,
            Self::ReleasePublicIp { .. } | Self::Delete { .. } => ActionKind::Delete,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::ReleasePublicIp { .. } => "release-public-ipv4",
            other => other.kind().label(),
        }
    }

    fn removes_resource(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// Classifies a VM.
///
/// `network` is the network named by `network_name`, looked up by the caller
/// only when the VM is absent and the intent creates it.
///
/// # Errors
///
/// Returns [`ReconcileError::Validation`] when the classified action lacks a
/// required option and [`ReconcileError::NotFound`] when creation needs a
/// network that does not exist.
pub fn classify_vm(
    desired: &VmSpec,
    found: Option<&VmSnapshot>,
    network: Option<&NetworkSnapshot>,
) -> Result<ActionPlan<VmAction>, ReconcileError> {
    let Some(vm) = found else {
        if !desired.creates_when_absent() {
            return Ok(ActionPlan::empty());
        }
        let new_vm = desired.new_vm()?;
        let resolved = network
            .ok_or_else(|| ReconcileError::not_found(ResourceKind::Network, &new_vm.network_name))?;
        return Ok(ActionPlan::single(VmAction::Create {
            network_uuid: resolved.uuid.clone(),
            vm: Box::new(new_vm),
        }));
    };

    let plan = match desired.state {
        VmState::Exists(Existence::Absent) => delete(desired, vm),
        VmState::Exists(Existence::Present) => resize_towards(vm, desired.sizing_over(vm.sizing())),
        VmState::Lifecycle(VmLifecycle::Resize) => resize_towards(vm, desired.target_sizing()?),
        VmState::Lifecycle(VmLifecycle::Active) if !vm.is_running() => {
            ActionPlan::single(VmAction::PowerOn {
                uuid: vm.uuid.clone(),
            })
        }
        VmState::Lifecycle(VmLifecycle::Inactive) if !vm.is_stopped() => {
            ActionPlan::single(VmAction::PowerOff {
                uuid: vm.uuid.clone(),
            })
        }
        VmState::Lifecycle(VmLifecycle::Active | VmLifecycle::Inactive) => ActionPlan::empty(),
    };
    Ok(plan)
}

fn resize_towards(vm: &VmSnapshot, to: Sizing) -> ActionPlan<VmAction> {
    let from = vm.sizing();
    if from == to {
        return ActionPlan::empty();
    }
    ActionPlan::single(VmAction::Resize {
        uuid: vm.uuid.clone(),
        disk_uuid: vm.disk_uuid.clone(),
        from,
        to,
    })
}

fn delete(desired: &VmSpec, vm: &VmSnapshot) -> ActionPlan<VmAction> {
    let release = vm
        .public_ipv4
        .clone()
        .filter(|_| desired.remove_public_ipv4)
        .map(|address| VmAction::ReleasePublicIp { address });
    release
        .into_iter()
        .chain([VmAction::Delete {
            uuid: vm.uuid.clone(),
        }])
        .collect()
}
