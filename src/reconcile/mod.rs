//! Reconcilers converging one resource kind each.
//!
//! A reconciler locates the live resource, classifies it against the desired
//! state, executes the resulting plan step by step and re-fetches the
//! resource for the report. Steps run strictly in order; a failing step
//! aborts the rest and the error is returned with whatever partial result
//! could be observed.

mod block_storage;
mod floating_ip;
mod network;
mod vm;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tracing::{info, warn};

use crate::client::{ApiRequest, ResourceClient};
use crate::desired::{DesiredState, Location};
use crate::differ::{ActionPlan, PlanStep};
use crate::error::{ReconcileError, ReconcileFailure};
use crate::locator::{DEFAULT_PAGE_SIZE, Locator};
use crate::model::{LiveResource, ResourceKind};
use crate::report::ReconcileResult;

pub use block_storage::BlockStorageReconciler;
pub use floating_ip::FloatingIpReconciler;
pub use network::NetworkReconciler;
pub use vm::VmReconciler;

/// Future returned by reconciler operations.
pub type EngineFuture<'a, T, E = ReconcileError> =
    Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Located live state and the plan converging it.
#[derive(Clone, Debug, PartialEq)]
pub struct Planned<S, A> {
    /// Live resource, if one was found.
    pub before: Option<S>,
    /// Steps required to converge.
    pub plan: ActionPlan<A>,
}

/// Converges resources of one kind.
pub trait Reconciler: Sync {
    /// Kind handled, used in logs.
    const KIND: ResourceKind;
    /// Desired-state descriptor.
    type Desired: Sync;
    /// Live snapshot.
    type Snapshot: Clone + Send + Sync + Into<LiveResource>;
    /// Plan step.
    type Action: PlanStep + Send + Sync;
    /// State threaded between steps, such as identifiers returned by a
    /// create call.
    type Cursor: Send;

    /// Locates and classifies without mutating anything.
    fn plan<'a>(
        &'a self,
        desired: &'a Self::Desired,
    ) -> EngineFuture<'a, Planned<Self::Snapshot, Self::Action>>;

    /// Initial cursor for executing a plan.
    fn cursor(&self, before: Option<&Self::Snapshot>) -> Self::Cursor;

    /// Executes one step.
    fn apply<'a>(
        &'a self,
        desired: &'a Self::Desired,
        action: &'a Self::Action,
        cursor: &'a mut Self::Cursor,
    ) -> EngineFuture<'a, ()>;

    /// Re-reads the resource after the plan ran.
    fn refetch<'a>(
        &'a self,
        desired: &'a Self::Desired,
        cursor: &'a Self::Cursor,
    ) -> EngineFuture<'a, Option<Self::Snapshot>>;

    /// Reports what [`Reconciler::reconcile`] would do.
    fn check<'a>(&'a self, desired: &'a Self::Desired) -> EngineFuture<'a, ReconcileResult> {
        Box::pin(async move {
            let Planned { before, plan } = self.plan(desired).await?;
            Ok(ReconcileResult::planned(
                before.map(Into::into),
                plan.labels(),
            ))
        })
    }

    /// Converges the resource.
    fn reconcile<'a>(
        &'a self,
        desired: &'a Self::Desired,
    ) -> EngineFuture<'a, ReconcileResult, ReconcileFailure> {
        Box::pin(drive(self, desired))
    }
}

async fn drive<R: Reconciler + ?Sized>(
    reconciler: &R,
    desired: &R::Desired,
) -> Result<ReconcileResult, ReconcileFailure> {
    let Planned { before, plan } = reconciler.plan(desired).await?;
    if plan.is_empty() {
        info!(kind = %R::KIND, "already converged");
        return Ok(ReconcileResult::unchanged(before.map(Into::into)));
    }

    let mut cursor = reconciler.cursor(before.as_ref());
    let mut executed = Vec::with_capacity(plan.len());
    let mut removed = false;
    for action in plan.steps() {
        info!(kind = %R::KIND, action = action.label(), "executing plan step");
        if let Err(error) = reconciler.apply(desired, action, &mut cursor).await {
            warn!(kind = %R::KIND, action = action.label(), %error, "plan step failed");
            let after = if removed {
                None
            } else {
                reconciler.refetch(desired, &cursor).await.ok().flatten()
            };
            let partial =
                ReconcileResult::partial(before.map(Into::into), after.map(Into::into), executed);
            return Err(ReconcileFailure::with_partial(error, partial));
        }
        removed |= action.removes_resource();
        executed.push(action.label().to_owned());
    }

    let after = if removed {
        None
    } else {
        match reconciler.refetch(desired, &cursor).await {
            Ok(after) => after,
            Err(error) => {
                let partial = ReconcileResult::partial(before.map(Into::into), None, executed);
                return Err(ReconcileFailure::with_partial(error, partial));
            }
        }
    };
    info!(kind = %R::KIND, actions = ?executed, "converged");
    Ok(ReconcileResult::applied(
        before.map(Into::into),
        after.map(Into::into),
        executed,
    ))
}

/// Issues a mutating call, mapping non-2xx statuses to
/// [`ReconcileError::Provider`].
async fn expect_success<C: ResourceClient + ?Sized>(
    client: &C,
    request: ApiRequest,
    operation: &str,
) -> Result<Value, ReconcileError> {
    let response = client.request(request).await?;
    if response.is_success() {
        return Ok(response.body);
    }
    Err(ReconcileError::Provider {
        operation: operation.to_owned(),
        status: response.status,
        body: response.body,
    })
}

/// Reads a string field from a 2xx response body.
fn body_field(body: &Value, field: &str, operation: &str) -> Result<String, ReconcileError> {
    body.get(field)
        .and_then(|value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .ok_or_else(|| ReconcileError::unexpected(operation, format!("response has no `{field}`")))
}

/// Entry point converging any [`DesiredState`] through one client.
#[derive(Debug)]
pub struct Engine<'c, C: ?Sized> {
    client: &'c C,
    page_size: u32,
}

impl<'c, C: ResourceClient + ?Sized> Engine<'c, C> {
    /// Creates an engine listing with [`DEFAULT_PAGE_SIZE`].
    #[must_use]
    pub const fn new(client: &'c C) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Overrides the listing page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Network reconciler.
    #[must_use]
    pub const fn network(&self) -> NetworkReconciler<'c, C> {
        NetworkReconciler::new(self.client, self.page_size)
    }

    /// VM reconciler.
    #[must_use]
    pub const fn vm(&self) -> VmReconciler<'c, C> {
        VmReconciler::new(self.client, self.page_size)
    }

    /// Floating IP reconciler.
    #[must_use]
    pub const fn floating_ip(&self) -> FloatingIpReconciler<'c, C> {
        FloatingIpReconciler::new(self.client, self.page_size)
    }

    /// Block storage reconciler.
    #[must_use]
    pub const fn block_storage(&self) -> BlockStorageReconciler<'c, C> {
        BlockStorageReconciler::new(self.client, self.page_size)
    }

    /// Converges one resource.
    ///
    /// # Errors
    ///
    /// Returns a [`ReconcileFailure`] carrying the error and, once any step
    /// ran, the partial result.
    pub async fn reconcile(
        &self,
        desired: &DesiredState,
    ) -> Result<ReconcileResult, ReconcileFailure> {
        match desired {
            DesiredState::Network(spec) => self.network().reconcile(spec).await,
            DesiredState::Vm(spec) => self.vm().reconcile(spec).await,
            DesiredState::FloatingIp(spec) => self.floating_ip().reconcile(spec).await,
            DesiredState::BlockStorage(spec) => self.block_storage().reconcile(spec).await,
        }
    }

    /// Reports what [`Engine::reconcile`] would do without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns validation and lookup errors.
    pub async fn check(&self, desired: &DesiredState) -> Result<ReconcileResult, ReconcileError> {
        match desired {
            DesiredState::Network(spec) => self.network().check(spec).await,
            DesiredState::Vm(spec) => self.vm().check(spec).await,
            DesiredState::FloatingIp(spec) => self.floating_ip().check(spec).await,
            DesiredState::BlockStorage(spec) => self.block_storage().check(spec).await,
        }
    }
}

fn locator<C: ResourceClient + ?Sized>(
    client: &C,
    location: Location,
    page_size: u32,
) -> Locator<'_, C> {
    Locator::new(client, location).with_page_size(page_size)
}
