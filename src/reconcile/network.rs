//! Network reconciler.

use super::{EngineFuture, Planned, Reconciler, expect_success, locator};
use crate::client::{ApiRequest, ResourceClient};
use crate::desired::NetworkSpec;
use crate::differ::{NetworkAction, classify_network};
use crate::model::{NetworkSnapshot, ResourceKind};

const NETWORK_PATH: &str = "network/network";

/// Converges VPC networks.
#[derive(Debug)]
pub struct NetworkReconciler<'c, C: ?Sized> {
    client: &'c C,
    page_size: u32,
}

impl<'c, C: ResourceClient + ?Sized> NetworkReconciler<'c, C> {
    /// Creates a reconciler listing `page_size` entries per page.
    #[must_use]
    pub const fn new(client: &'c C, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

impl<C: ResourceClient + ?Sized> Reconciler for NetworkReconciler<'_, C> {
    const KIND: ResourceKind = ResourceKind::Network;
    type Desired = NetworkSpec;
    type Snapshot = NetworkSnapshot;
    type Action = NetworkAction;
    type Cursor = ();

    fn plan<'a>(
        &'a self,
        desired: &'a NetworkSpec,
    ) -> EngineFuture<'a, Planned<NetworkSnapshot, NetworkAction>> {
        Box::pin(async move {
            desired.validate()?;
            let before = locator(self.client, desired.location, self.page_size)
                .network_by_name(&desired.name)
                .await?;
            let plan = classify_network(desired, before.as_ref());
            Ok(Planned { before, plan })
        })
    }

    fn cursor(&self, _before: Option<&NetworkSnapshot>) -> Self::Cursor {}

    fn apply<'a>(
        &'a self,
        desired: &'a NetworkSpec,
        action: &'a NetworkAction,
        _cursor: &'a mut (),
    ) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            let request = match action {
                NetworkAction::Create { name } => {
                    ApiRequest::post(desired.location.path(NETWORK_PATH)).query("name", name)
                }
                NetworkAction::Delete { uuid } => {
                    ApiRequest::delete(desired.location.path(&format!("{NETWORK_PATH}/{uuid}")))
                }
            };
            let operation = match action {
                NetworkAction::Create { .. } => "create network",
                NetworkAction::Delete { .. } => "delete network",
            };
            expect_success(self.client, request, operation).await?;
            Ok(())
        })
    }

    fn refetch<'a>(
        &'a self,
        desired: &'a NetworkSpec,
        _cursor: &'a (),
    ) -> EngineFuture<'a, Option<NetworkSnapshot>> {
        Box::pin(async move {
            locator(self.client, desired.location, self.page_size)
                .network_by_name(&desired.name)
                .await
        })
    }
}
