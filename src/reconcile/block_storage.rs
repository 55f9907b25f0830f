//! Block storage reconciler.
//!
//! Disks are addressed through the VM they are attached to. The provider
//! names new disks itself, so a freshly created disk is tracked by the
//! identifier returned from the create call rather than by the requested
//! name.

use tracing::warn;

use super::{EngineFuture, Planned, Reconciler, body_field, expect_success, locator};
use crate::client::{ApiRequest, ResourceClient};
use crate::desired::BlockStorageSpec;
use crate::differ::{BlockStorageAction, classify_block_storage};
use crate::error::ReconcileError;
use crate::locator::VmKey;
use crate::model::{DiskSnapshot, ResourceKind, VmSnapshot};

const VM_STORAGE_PATH: &str = "user-resource/vm/storage";
const DISKS_PATH: &str = "storage/disks";

/// Converges block storage disks.
#[derive(Debug)]
pub struct BlockStorageReconciler<'c, C: ?Sized> {
    client: &'c C,
    page_size: u32,
}

impl<'c, C: ResourceClient + ?Sized> BlockStorageReconciler<'c, C> {
    /// Creates a reconciler listing `page_size` entries per page.
    #[must_use]
    pub const fn new(client: &'c C, page_size: u32) -> Self {
        Self { client, page_size }
    }

    async fn owning_vm(&self, desired: &BlockStorageSpec) -> Result<VmSnapshot, ReconcileError> {
        locator(self.client, desired.location, self.page_size)
            .vm(&VmKey::Name(desired.vm_name.clone()))
            .await?
            .ok_or_else(|| ReconcileError::not_found(ResourceKind::Vm, &desired.vm_name))
    }
}

fn find_disk<'v>(vm: &'v VmSnapshot, key: &str) -> Option<&'v DiskSnapshot> {
    vm.disk_named(key).or_else(|| vm.disk_by_uuid(key))
}

impl<C: ResourceClient + ?Sized> Reconciler for BlockStorageReconciler<'_, C> {
    const KIND: ResourceKind = ResourceKind::BlockStorage;
    type Desired = BlockStorageSpec;
    type Snapshot = DiskSnapshot;
    type Action = BlockStorageAction;
    /// Identifier of the disk being converged, once known.
    type Cursor = Option<String>;

    fn plan<'a>(
        &'a self,
        desired: &'a BlockStorageSpec,
    ) -> EngineFuture<'a, Planned<DiskSnapshot, BlockStorageAction>> {
        Box::pin(async move {
            desired.validate()?;
            let vm = self.owning_vm(desired).await?;
            let before = find_disk(&vm, &desired.name).cloned();
            let plan = classify_block_storage(desired, &vm, before.as_ref())?;
            Ok(Planned { before, plan })
        })
    }

    fn cursor(&self, before: Option<&DiskSnapshot>) -> Self::Cursor {
        before.map(|disk| disk.uuid.clone())
    }

    fn apply<'a>(
        &'a self,
        desired: &'a BlockStorageSpec,
        action: &'a BlockStorageAction,
        cursor: &'a mut Option<String>,
    ) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            let location = desired.location;
            match action {
                BlockStorageAction::Create { vm_uuid, size } => {
                    let operation = "create block storage";
                    let request = ApiRequest::post(location.path(VM_STORAGE_PATH))
                        .form_field("uuid", vm_uuid)
                        .form_field("size_gb", size);
                    let body = expect_success(self.client, request, operation).await?;
                    let uuid = body_field(&body, "uuid", operation)?;
                    if let Ok(assigned) = body_field(&body, "name", operation)
                        && assigned != desired.name
                    {
                        warn!(
                            requested = %desired.name,
                            %assigned,
                            "provider assigned a different disk name"
                        );
                    }
                    *cursor = Some(uuid);
                }
                BlockStorageAction::Resize {
                    vm_uuid,
                    disk_uuid,
                    to,
                    ..
                } => {
                    let request = ApiRequest::patch(location.path(VM_STORAGE_PATH))
                        .form_field("uuid", vm_uuid)
                        .form_field("disk_uuid", disk_uuid)
                        .form_field("size_gb", to);
                    expect_success(self.client, request, "resize block storage").await?;
                }
                BlockStorageAction::Detach { vm_uuid, disk_uuid } => {
                    let request = ApiRequest::delete(location.path(VM_STORAGE_PATH))
                        .form_field("uuid", vm_uuid)
                        .form_field("storage_uuid", disk_uuid);
                    expect_success(self.client, request, "detach block storage").await?;
                }
                BlockStorageAction::Delete { disk_uuid } => {
                    let request =
                        ApiRequest::delete(location.path(&format!("{DISKS_PATH}/{disk_uuid}")));
                    expect_success(self.client, request, "delete block storage").await?;
                }
            }
            Ok(())
        })
    }

    fn refetch<'a>(
        &'a self,
        desired: &'a BlockStorageSpec,
        cursor: &'a Option<String>,
    ) -> EngineFuture<'a, Option<DiskSnapshot>> {
        Box::pin(async move {
            let vm = self.owning_vm(desired).await?;
            let key = cursor.as_deref().unwrap_or(&desired.name);
            Ok(find_disk(&vm, key).cloned())
        })
    }
}
