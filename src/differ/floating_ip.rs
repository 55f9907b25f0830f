//! Floating IP classification.

use super::{ActionKind, ActionPlan, PlanStep};
use crate::desired::{FloatingIpSpec, FloatingIpState};
use crate::error::ReconcileError;
use crate::model::{FloatingIpSnapshot, VmSnapshot};

/// Primitive floating IP operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FloatingIpAction {
    /// Reserve a new address.
    Create {
        /// Informative name.
        name: String,
    },
    /// Assign the address to a VM.
    Attach {
        /// Target VM identifier.
        vm_uuid: String,
        /// Target VM name.
        vm_name: String,
    },
    /// Unassign the address from its VM.
    Detach {
        /// VM the address is currently assigned to.
        from_vm_uuid: String,
    },
    /// Release the address.
    Delete {
        /// Public address.
        address: String,
    },
}

impl PlanStep for FloatingIpAction {
    fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Attach { .. } => ActionKind::Attach,
            Self::Detach { .. } => ActionKind::Detach,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    fn removes_resource(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// Classifies a floating IP.
///
/// `target_vm` is the VM named by `vm_name`, resolved by the caller.
///
/// # Errors
///
/// Returns [`ReconcileError::Validation`] when the address must be created
/// and no `name` is given.
pub fn classify_floating_ip(
    desired: &FloatingIpSpec,
    found: Option<&FloatingIpSnapshot>,
    target_vm: Option<&VmSnapshot>,
) -> Result<ActionPlan<FloatingIpAction>, ReconcileError> {
    let mut plan = ActionPlan::empty();
    match (desired.state, found) {
        (FloatingIpState::Present, None) => {
            let name = desired
                .name
                .clone()
                .ok_or_else(|| ReconcileError::missing("name", "create floating IP"))?;
            plan.push(FloatingIpAction::Create { name });
            if let Some(vm) = target_vm {
                plan.push(attach(vm));
            }
        }
        (FloatingIpState::Present, Some(ip)) => {
            if let Some(vm) = target_vm {
                match ip.assigned_to_vm_uuid.as_deref() {
                    Some(current) if current == vm.uuid => {}
                    Some(current) => {
                        plan.push(FloatingIpAction::Detach {
                            from_vm_uuid: current.to_owned(),
                        });
                        plan.push(attach(vm));
                    }
                    None => plan.push(attach(vm)),
                }
            }
        }
        (FloatingIpState::Absent, Some(ip)) => plan.push(FloatingIpAction::Delete {
            address: ip.public_ipv4.clone(),
        }),
        (FloatingIpState::Unassigned, Some(ip)) => {
            if let Some(current) = &ip.assigned_to_vm_uuid {
                plan.push(FloatingIpAction::Detach {
                    from_vm_uuid: current.clone(),
                });
            }
        }
        (FloatingIpState::Absent | FloatingIpState::Unassigned, None) => {}
    }
    Ok(plan)
}

fn attach(vm: &VmSnapshot) -> FloatingIpAction {
    FloatingIpAction::Attach {
        vm_uuid: vm.uuid.clone(),
        vm_name: vm.name.clone(),
    }
}
