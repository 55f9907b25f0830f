//! Shared fixtures for reconciliation BDD scenarios.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use idch::test_support::FakeCloud;
use idch::{DesiredState, ReconcileFailure, ReconcileResult};
use rstest::fixture;

/// Outcome of one `When` step.
#[derive(Clone, Debug)]
pub enum Outcome {
    Converged(ReconcileResult),
    Failed(ReconcileFailure),
}

/// Scenario state. Clones share the provider and the recorded outcomes.
#[derive(Clone, Debug, Default)]
pub struct ReconcileContext {
    pub cloud: FakeCloud,
    desired: Arc<Mutex<Option<DesiredState>>>,
    outcomes: Arc<Mutex<Vec<Outcome>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ReconcileContext {
    pub fn set_desired(&self, desired: DesiredState) {
        *lock(&self.desired) = Some(desired);
    }

    pub fn desired(&self) -> Option<DesiredState> {
        lock(&self.desired).clone()
    }

    pub fn record(&self, outcome: Outcome) {
        lock(&self.outcomes).push(outcome);
    }

    pub fn first_outcome(&self) -> Option<Outcome> {
        lock(&self.outcomes).first().cloned()
    }

    pub fn last_outcome(&self) -> Option<Outcome> {
        lock(&self.outcomes).last().cloned()
    }
}

#[fixture]
pub fn reconcile_context() -> ReconcileContext {
    ReconcileContext::default()
}
