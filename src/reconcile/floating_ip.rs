//! Floating IP reconciler.

use super::{EngineFuture, Planned, Reconciler, expect_success, locator};
use crate::client::{ApiRequest, ResourceClient};
use crate::desired::{FloatingIpSpec, FloatingIpState};
use crate::differ::{FloatingIpAction, classify_floating_ip};
use crate::error::ReconcileError;
use crate::locator::{FloatingIpKey, VmKey};
use crate::model::{FloatingIpRecord, FloatingIpSnapshot, ResourceKind};

const FLOATING_IPS_PATH: &str = "network/ip_addresses";

/// Converges floating IPv4 addresses.
#[derive(Debug)]
pub struct FloatingIpReconciler<'c, C: ?Sized> {
    client: &'c C,
    page_size: u32,
}

impl<'c, C: ResourceClient + ?Sized> FloatingIpReconciler<'c, C> {
    /// Creates a reconciler listing `page_size` entries per page.
    #[must_use]
    pub const fn new(client: &'c C, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

fn current_address<'a>(
    cursor: &'a Option<FloatingIpSnapshot>,
    operation: &str,
) -> Result<&'a str, ReconcileError> {
    cursor
        .as_ref()
        .map(|ip| ip.public_ipv4.as_str())
        .ok_or_else(|| ReconcileError::unexpected(operation, "no floating IP to act on"))
}

impl<C: ResourceClient + ?Sized> Reconciler for FloatingIpReconciler<'_, C> {
    const KIND: ResourceKind = ResourceKind::FloatingIp;
    type Desired = FloatingIpSpec;
    type Snapshot = FloatingIpSnapshot;
    type Action = FloatingIpAction;
    /// The address being converged; set by a create step.
    type Cursor = Option<FloatingIpSnapshot>;

    fn plan<'a>(
        &'a self,
        desired: &'a FloatingIpSpec,
    ) -> EngineFuture<'a, Planned<FloatingIpSnapshot, FloatingIpAction>> {
        Box::pin(async move {
            desired.validate()?;
            let lookup = locator(self.client, desired.location, self.page_size);
            let before = lookup.floating_ip(&desired.key()?).await?;

            let target_vm = match (&desired.vm_name, desired.state) {
                (Some(vm_name), FloatingIpState::Present) => Some(
                    lookup
                        .vm(&VmKey::Name(vm_name.clone()))
                        .await?
                        .ok_or_else(|| ReconcileError::not_found(ResourceKind::Vm, vm_name))?,
                ),
                _ => None,
            };
            let plan = classify_floating_ip(desired, before.as_ref(), target_vm.as_ref())?;
            Ok(Planned { before, plan })
        })
    }

    fn cursor(&self, before: Option<&FloatingIpSnapshot>) -> Self::Cursor {
        before.cloned()
    }

    fn apply<'a>(
        &'a self,
        desired: &'a FloatingIpSpec,
        action: &'a FloatingIpAction,
        cursor: &'a mut Option<FloatingIpSnapshot>,
    ) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            let location = desired.location;
            match action {
                FloatingIpAction::Create { name } => {
                    let operation = "create floating IP";
                    let request = ApiRequest::post(location.path(FLOATING_IPS_PATH))
                        .json(serde_json::json!({ "name": name }));
                    let body = expect_success(self.client, request, operation).await?;
                    let record: FloatingIpRecord = serde_json::from_value(body)
                        .map_err(|err| ReconcileError::unexpected(operation, err.to_string()))?;
                    *cursor = Some(record.into());
                }
                FloatingIpAction::Attach { vm_uuid, vm_name } => {
                    let operation = "assign floating IP";
                    let address = current_address(cursor, operation)?;
                    let request = ApiRequest::post(
                        location.path(&format!("{FLOATING_IPS_PATH}/{address}/assign")),
                    )
                    .json(serde_json::json!({ "vm_uuid": vm_uuid }));
                    expect_success(self.client, request, operation).await?;
                    tracing::debug!(%address, vm = %vm_name, "floating IP assigned");
                }
                FloatingIpAction::Detach { from_vm_uuid } => {
                    let operation = "unassign floating IP";
                    let address = current_address(cursor, operation)?;
                    let request = ApiRequest::post(
                        location.path(&format!("{FLOATING_IPS_PATH}/{address}/unassign")),
                    );
                    expect_success(self.client, request, operation).await?;
                    tracing::debug!(%address, vm = %from_vm_uuid, "floating IP unassigned");
                }
                FloatingIpAction::Delete { address } => {
                    let path = location.path(&format!("{FLOATING_IPS_PATH}/{address}"));
                    let request = ApiRequest::delete(path);
                    expect_success(self.client, request, "release floating IP").await?;
                }
            }
            Ok(())
        })
    }

    fn refetch<'a>(
        &'a self,
        desired: &'a FloatingIpSpec,
        cursor: &'a Option<FloatingIpSnapshot>,
    ) -> EngineFuture<'a, Option<FloatingIpSnapshot>> {
        Box::pin(async move {
            let key = match cursor {
                Some(ip) => FloatingIpKey::Uuid(ip.uuid.clone()),
                None => desired.key()?,
            };
            locator(self.client, desired.location, self.page_size)
                .floating_ip(&key)
                .await
        })
    }
}
