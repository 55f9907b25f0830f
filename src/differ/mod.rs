//! Classification of desired state against live state.
//!
//! Classifiers are pure: they take a spec and whatever the locator found and
//! return an [`ActionPlan`] of primitive operations. They never call the
//! provider, so action-dependent validation (for instance the options needed
//! to create a VM) fails before anything is mutated.

mod block_storage;
mod floating_ip;
mod network;
mod vm;

use std::fmt;

use serde::Serialize;

pub use block_storage::{BlockStorageAction, classify_block_storage};
pub use floating_ip::{FloatingIpAction, classify_floating_ip};
pub use network::{NetworkAction, classify_network};
pub use vm::{VmAction, classify_vm};

/// Primitive operation kinds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Create the resource.
    Create,
    /// Update mutable fields in place.
    UpdateFields,
    /// Change sizing.
    Resize,
    /// Start a stopped VM.
    PowerOn,
    /// Stop a running VM.
    PowerOff,
    /// Attach to another resource.
    Attach,
    /// Detach from another resource.
    Detach,
    /// Delete the resource (or a resource it owns).
    Delete,
}

impl ActionKind {
    /// Returns the label used in results and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::UpdateFields => "update-field-set",
            Self::Resize => "resize",
            Self::PowerOn => "power-on",
            Self::PowerOff => "power-off",
            Self::Attach => "attach",
            Self::Detach => "detach",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single step of an [`ActionPlan`].
pub trait PlanStep {
    /// Primitive kind of the step.
    fn kind(&self) -> ActionKind;

    /// Label reported for the step.
    fn label(&self) -> &'static str {
        self.kind().label()
    }

    /// Whether the managed resource no longer exists once the step ran.
    fn removes_resource(&self) -> bool {
        false
    }
}

/// Ordered primitive operations converging one resource.
///
/// An empty plan means the resource has already converged.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionPlan<A> {
    steps: Vec<A>,
}

impl<A> Default for ActionPlan<A> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<A> ActionPlan<A> {
    /// A plan with no steps.
    #[must_use]
    pub const fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// A plan with one step.
    #[must_use]
    pub fn single(step: A) -> Self {
        Self { steps: vec![step] }
    }

    /// Appends a step.
    pub fn push(&mut self, step: A) {
        self.steps.push(step);
    }

    /// Whether there is nothing to do.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.steps.len()
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[A] {
        &self.steps
    }
}

impl<A: PlanStep> ActionPlan<A> {
    /// Labels of every step in execution order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| step.label().to_owned())
            .collect()
    }

    /// Kinds of every step in execution order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ActionKind> {
        self.steps.iter().map(PlanStep::kind).collect()
    }
}

impl<A> FromIterator<A> for ActionPlan<A> {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}
