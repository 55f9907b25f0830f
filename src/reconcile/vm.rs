//! VM reconciler.
//!
//! Power transitions are requested, not awaited: the provider's synchronous
//! answer is taken as the outcome. Resizing never stops the VM implicitly;
//! a provider that refuses to resize a running VM surfaces as
//! [`ReconcileError::Provider`].

use super::{EngineFuture, Planned, Reconciler, expect_success, locator};
use crate::client::{ApiRequest, ResourceClient};
use crate::desired::{Location, NewVm, VmSpec};
use crate::differ::{VmAction, classify_vm};
use crate::error::ReconcileError;
use crate::locator::VmKey;
use crate::model::{ResourceKind, Sizing, VmSnapshot};

const VM_PATH: &str = "user-resource/vm";
const VM_STORAGE_PATH: &str = "user-resource/vm/storage";
const VM_START_PATH: &str = "user-resource/vm/start";
const VM_STOP_PATH: &str = "user-resource/vm/stop";
const FLOATING_IPS_PATH: &str = "network/ip_addresses";

/// Converges virtual machines.
#[derive(Debug)]
pub struct VmReconciler<'c, C: ?Sized> {
    client: &'c C,
    page_size: u32,
}

impl<'c, C: ResourceClient + ?Sized> VmReconciler<'c, C> {
    /// Creates a reconciler listing `page_size` entries per page.
    #[must_use]
    pub const fn new(client: &'c C, page_size: u32) -> Self {
        Self { client, page_size }
    }

    async fn create(
        &self,
        location: Location,
        vm: &NewVm,
        network_uuid: &str,
    ) -> Result<(), ReconcileError> {
        let request = ApiRequest::post(location.path(VM_PATH))
            .form_field("network_uuid", network_uuid)
            .form_field("name", &vm.name)
            .form_field("os_name", &vm.os_name)
            .form_field("os_version", &vm.os_version)
            .form_field("disks", vm.sizing.disks)
            .form_field("vcpu", vm.sizing.vcpu)
            .form_field("ram", vm.sizing.ram)
            .form_field("username", &vm.username)
            .form_field("password", vm.password.expose());
        expect_success(self.client, request, "create VM").await?;
        Ok(())
    }

    async fn resize(
        &self,
        desired: &VmSpec,
        uuid: &str,
        disk_uuid: Option<&str>,
        from: Sizing,
        to: Sizing,
    ) -> Result<(), ReconcileError> {
        let location = desired.location;
        if from.vcpu != to.vcpu || from.ram != to.ram {
            let request = ApiRequest::patch(location.path(VM_PATH))
                .form_field("uuid", uuid)
                .form_field("name", &desired.name)
                .form_field("vcpu", to.vcpu)
                .form_field("ram", to.ram);
            expect_success(self.client, request, "resize VM").await?;
        }
        if from.disks != to.disks {
            let primary = disk_uuid.ok_or_else(|| {
                ReconcileError::unexpected("resize VM disk", "VM reports no primary disk")
            })?;
            let request = ApiRequest::patch(location.path(VM_STORAGE_PATH))
                .form_field("uuid", uuid)
                .form_field("disk_uuid", primary)
                .form_field("size_gb", to.disks);
            expect_success(self.client, request, "resize VM disk").await?;
        }
        Ok(())
    }
}

impl<C: ResourceClient + ?Sized> Reconciler for VmReconciler<'_, C> {
    const KIND: ResourceKind = ResourceKind::Vm;
    type Desired = VmSpec;
    type Snapshot = VmSnapshot;
    type Action = VmAction;
    type Cursor = ();

    fn plan<'a>(&'a self, desired: &'a VmSpec) -> EngineFuture<'a, Planned<VmSnapshot, VmAction>> {
        Box::pin(async move {
            desired.validate()?;
            let lookup = locator(self.client, desired.location, self.page_size);
            let before = lookup.vm(&VmKey::Name(desired.name.clone())).await?;

            let network = match (&before, desired.creates_when_absent()) {
                (None, true) => {
                    let new_vm = desired.new_vm()?;
                    lookup.network_by_name(&new_vm.network_name).await?
                }
                _ => None,
            };
            let plan = classify_vm(desired, before.as_ref(), network.as_ref())?;
            Ok(Planned { before, plan })
        })
    }

    fn cursor(&self, _before: Option<&VmSnapshot>) -> Self::Cursor {}

    fn apply<'a>(
        &'a self,
        desired: &'a VmSpec,
        action: &'a VmAction,
        _cursor: &'a mut (),
    ) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            let location = desired.location;
            match action {
                VmAction::Create { vm, network_uuid } => {
                    self.create(location, vm, network_uuid).await
                }
                VmAction::Resize {
                    uuid,
                    disk_uuid,
                    from,
                    to,
                } => {
                    self.resize(desired, uuid, disk_uuid.as_deref(), *from, *to)
                        .await
                }
                VmAction::PowerOn { uuid } => {
                    let request =
                        ApiRequest::post(location.path(VM_START_PATH)).form_field("uuid", uuid);
                    expect_success(self.client, request, "start VM").await.map(drop)
                }
                VmAction::PowerOff { uuid } => {
                    let request =
                        ApiRequest::post(location.path(VM_STOP_PATH)).form_field("uuid", uuid);
                    expect_success(self.client, request, "stop VM").await.map(drop)
                }
                VmAction::ReleasePublicIp { address } => {
                    let path = location.path(&format!("{FLOATING_IPS_PATH}/{address}"));
                    let request = ApiRequest::delete(path);
                    expect_success(self.client, request, "release public IPv4")
                        .await
                        .map(drop)
                }
                VmAction::Delete { uuid } => {
                    let request =
                        ApiRequest::delete(location.path(VM_PATH)).form_field("uuid", uuid);
                    expect_success(self.client, request, "delete VM").await.map(drop)
                }
            }
        })
    }

    fn refetch<'a>(
        &'a self,
        desired: &'a VmSpec,
        _cursor: &'a (),
    ) -> EngineFuture<'a, Option<VmSnapshot>> {
        Box::pin(async move {
            locator(self.client, desired.location, self.page_size)
                .vm(&VmKey::Name(desired.name.clone()))
                .await
        })
    }
}
