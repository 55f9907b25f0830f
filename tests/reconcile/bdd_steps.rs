//! BDD step definitions for reconciliation scenarios.

use idch::client::Method;
use idch::{
    BlockStorageSpec, DesiredState, Engine, Existence, FloatingIpSpec, Location, NetworkSpec,
    ReconcileResult, VmSpec,
};
use rstest_bdd_macros::{given, then, when};
use serde_json::json;
use tokio::runtime::Runtime;

use super::test_helpers::{Outcome, ReconcileContext};

const LOCATION: Location = Location::Jkt01;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("invalid scenario input: {0}")]
    Input(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a location with a network named \"{name}\"")]
fn location_with_network(
    mut reconcile_context: ReconcileContext,
    name: String,
) -> ReconcileContext {
    reconcile_context.cloud.with_network(&name);
    reconcile_context
}

#[given("a \"{status}\" VM named \"{name}\" on network \"{network}\"")]
fn existing_vm(
    mut reconcile_context: ReconcileContext,
    status: String,
    name: String,
    network: String,
) -> ReconcileContext {
    reconcile_context.cloud.with_vm(&name, &network, &status);
    reconcile_context
}

#[given("a floating IP named \"{name}\" assigned to VM \"{vm}\"")]
fn existing_floating_ip(
    mut reconcile_context: ReconcileContext,
    name: String,
    vm: String,
) -> Result<ReconcileContext, StepError> {
    let uuid = reconcile_context
        .cloud
        .vm_uuid(&vm)
        .ok_or_else(|| StepError::Input(format!("no VM named {vm}")))?;
    reconcile_context.cloud.with_floating_ip(&name, Some(uuid.as_str()));
    Ok(reconcile_context)
}

#[given("VM \"{vm}\" has an extra disk of {size} GB")]
fn existing_disk(
    mut reconcile_context: ReconcileContext,
    vm: String,
    size: u32,
) -> Result<ReconcileContext, StepError> {
    reconcile_context
        .cloud
        .with_disk(&vm, size)
        .ok_or_else(|| StepError::Input(format!("no VM named {vm}")))?;
    Ok(reconcile_context)
}

#[given("assigning floating IPs fails")]
fn assign_fails(reconcile_context: ReconcileContext) -> ReconcileContext {
    reconcile_context
        .cloud
        .fail_on(Method::Post, "/assign", 500, json!({"message": "assignment failed"}));
    reconcile_context
}

#[given("the desired network \"{name}\" is present")]
fn desired_network(reconcile_context: ReconcileContext, name: String) -> ReconcileContext {
    reconcile_context.set_desired(DesiredState::Network(NetworkSpec::present(name, LOCATION)));
    reconcile_context
}

#[given("the desired VM \"{name}\" is \"{state}\"")]
fn desired_vm(
    reconcile_context: ReconcileContext,
    name: String,
    state: String,
) -> Result<ReconcileContext, StepError> {
    let parsed = state
        .parse()
        .map_err(|err: idch::ReconcileError| StepError::Input(err.to_string()))?;
    reconcile_context.set_desired(DesiredState::Vm(VmSpec {
        state: parsed,
        ..VmSpec::named(name, LOCATION)
    }));
    Ok(reconcile_context)
}

#[given("the desired floating IP \"{name}\" is assigned to VM \"{vm}\"")]
fn desired_floating_ip(
    reconcile_context: ReconcileContext,
    name: String,
    vm: String,
) -> ReconcileContext {
    reconcile_context.set_desired(DesiredState::FloatingIp(FloatingIpSpec {
        vm_name: Some(vm),
        ..FloatingIpSpec::named(name, LOCATION)
    }));
    reconcile_context
}

#[given("the desired disk \"{name}\" on VM \"{vm}\" has {size} GB")]
fn desired_disk(
    reconcile_context: ReconcileContext,
    name: String,
    vm: String,
    size: u32,
) -> ReconcileContext {
    reconcile_context.set_desired(DesiredState::BlockStorage(BlockStorageSpec {
        name,
        location: LOCATION,
        vm_name: vm,
        size: Some(size),
        state: Existence::Present,
    }));
    reconcile_context
}

fn run(reconcile_context: &ReconcileContext, check: bool) -> Result<(), StepError> {
    let desired = reconcile_context
        .desired()
        .ok_or_else(|| StepError::Input(String::from("no desired state given")))?;
    let runtime = Runtime::new().map_err(|err| StepError::Input(err.to_string()))?;
    let cloud = reconcile_context.cloud.clone();
    let outcome = runtime.block_on(async move {
        let engine = Engine::new(&cloud);
        if check {
            return engine
                .check(&desired)
                .await
                .map_err(idch::ReconcileFailure::from);
        }
        engine.reconcile(&desired).await
    });
    reconcile_context.record(match outcome {
        Ok(result) => Outcome::Converged(result),
        Err(failure) => Outcome::Failed(failure),
    });
    Ok(())
}

#[when("I reconcile")]
fn reconcile(reconcile_context: ReconcileContext) -> Result<ReconcileContext, StepError> {
    run(&reconcile_context, false)?;
    Ok(reconcile_context)
}

#[when("I check")]
fn check(reconcile_context: ReconcileContext) -> Result<ReconcileContext, StepError> {
    run(&reconcile_context, true)?;
    Ok(reconcile_context)
}

fn converged(outcome: Option<Outcome>) -> Result<ReconcileResult, StepError> {
    match outcome {
        Some(Outcome::Converged(result)) => Ok(result),
        Some(Outcome::Failed(failure)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {failure}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

fn expect_actions(result: &ReconcileResult, actions: &str) -> Result<(), StepError> {
    let expected: Vec<&str> = actions.split(',').map(str::trim).collect();
    if result.changed && result.actions == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected actions {expected:?}, got {:?} (changed: {})",
            result.actions, result.changed
        )))
    }
}

#[then("the first result reports actions \"{actions}\"")]
fn first_actions(reconcile_context: &ReconcileContext, actions: String) -> Result<(), StepError> {
    expect_actions(&converged(reconcile_context.first_outcome())?, &actions)
}

#[then("the last result reports actions \"{actions}\"")]
fn last_actions(reconcile_context: &ReconcileContext, actions: String) -> Result<(), StepError> {
    expect_actions(&converged(reconcile_context.last_outcome())?, &actions)
}

#[then("the last result reports no changes")]
fn no_changes(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let result = converged(reconcile_context.last_outcome())?;
    if !result.changed && result.actions.is_empty() && result.after == result.before {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no changes, got {:?}",
            result.actions
        )))
    }
}

#[then("VM \"{name}\" is \"{status}\"")]
fn vm_status(
    reconcile_context: &ReconcileContext,
    name: String,
    status: String,
) -> Result<(), StepError> {
    let current = reconcile_context.cloud.vm_status(&name);
    if current.as_deref() == Some(status.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected VM {name} to be {status}, got {current:?}"
        )))
    }
}

#[then("the provider received no mutating requests")]
fn no_mutations(reconcile_context: &ReconcileContext) -> Result<(), StepError> {
    let mutations = reconcile_context.cloud.mutations();
    if mutations.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no mutating requests, got {mutations:?}"
        )))
    }
}

#[then("the reconciliation fails after actions \"{actions}\"")]
fn failed_after(reconcile_context: &ReconcileContext, actions: String) -> Result<(), StepError> {
    let Some(Outcome::Failed(failure)) = reconcile_context.last_outcome() else {
        return Err(StepError::Assertion(String::from("expected a failure")));
    };
    let partial = failure
        .partial
        .ok_or_else(|| StepError::Assertion(String::from("missing partial result")))?;
    expect_actions(&partial, &actions)
}
