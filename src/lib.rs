//! Declarative state reconciliation for IDCloudHost resources.
//!
//! The crate converges VPC networks, virtual machines, floating IPv4
//! addresses and block storage disks towards a desired state. Each
//! reconciliation locates the live resource, classifies it against the
//! desired state into an ordered plan of primitive actions, executes the plan
//! through a [`ResourceClient`] and reports a [`ReconcileResult`].

pub mod client;
pub mod config;
pub mod desired;
pub mod differ;
pub mod error;
pub mod locator;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod test_support;

pub use client::{
    ApiRequest, ApiResponse, ClientError, ClientFuture, HttpClient, Method, RequestBody,
    ResourceClient,
};
pub use config::{ConfigError, IdchConfig};
pub use desired::{
    BlockStorageSpec, DesiredState, Existence, FloatingIpSpec, FloatingIpState, Location,
    NetworkSpec, Secret, VmLifecycle, VmSpec, VmState,
};
pub use differ::{ActionKind, ActionPlan, PlanStep};
pub use error::{ReconcileError, ReconcileFailure};
pub use locator::{DEFAULT_PAGE_SIZE, FloatingIpKey, Locator, MAX_PAGES, VmKey};
pub use model::{
    DiskSnapshot, FloatingIpSnapshot, LiveResource, NetworkSnapshot, ResourceKind, Sizing,
    VmSnapshot,
};
pub use reconcile::{Engine, Planned, Reconciler};
pub use report::ReconcileResult;
