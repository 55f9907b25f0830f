//! BDD scenarios for reconciliation.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ReconcileContext, reconcile_context};

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Create a missing network and converge on rerun"
)]
fn scenario_create_network(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(path = "tests/features/reconcile.feature", name = "Stop a running VM")]
fn scenario_stop_vm(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Move a floating IP to another VM"
)]
fn scenario_move_floating_ip(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Requesting a smaller disk leaves it untouched"
)]
fn scenario_disk_never_shrinks(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Check mode plans without mutating"
)]
fn scenario_check_mode(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}

#[scenario(
    path = "tests/features/reconcile.feature",
    name = "Surface a failing step with a partial result"
)]
fn scenario_partial_failure(reconcile_context: ReconcileContext) {
    drop(reconcile_context);
}
