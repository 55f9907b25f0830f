//! Binary entry point for the `idch` CLI.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use idch::{
    BlockStorageSpec, ClientError, ConfigError, DesiredState, Engine, FloatingIpSpec, HttpClient,
    IdchConfig, Location, NetworkSpec, ReconcileError, ReconcileResult, ResourceClient, Secret,
    VmSpec,
};

mod cli;

use cli::{
    ApplyCommand, BlockStorageCommand, Cli, Command, FloatingIpCommand, NetworkCommand, VmCommand,
};

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

const LOG_ENV: &str = "IDCH_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";
#[cfg(feature = "test-backdoors")]
const FAKE_CLOUD_ENV: &str = "IDCH_FAKE_CLOUD_STATE";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("client error: {0}")]
    Client(#[from] ClientError),
    #[error("invalid input: {0}")]
    Input(String),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("failed to write result: {0}")]
    Output(String),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli, &mut io::stdout()).await {
        Ok(()) => 0,
        Err(err) => {
            write_error(io::stderr(), &err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    let config = IdchConfig::load_without_cli_args()?;
    let fallback = config.location()?;
    let desired = desired_state(cli.command, cli.location.as_deref(), fallback)?;

    #[cfg(feature = "test-backdoors")]
    if let Some(path) = std::env::var_os(FAKE_CLOUD_ENV) {
        return converge_fake(Path::new(&path), config.page_size, &desired, cli.check, out).await;
    }

    config.validate()?;
    let client = HttpClient::from_config(&config)?;
    converge(&client, config.page_size, &desired, cli.check, out).await
}

async fn converge<C: ResourceClient + ?Sized>(
    client: &C,
    page_size: u32,
    desired: &DesiredState,
    check: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let engine = Engine::new(client).with_page_size(page_size);
    if check {
        let planned = engine.check(desired).await?;
        return write_result(out, &planned);
    }
    match engine.reconcile(desired).await {
        Ok(result) => write_result(out, &result),
        Err(failure) => {
            if let Some(partial) = &failure.partial {
                write_result(out, partial)?;
            }
            Err(CliError::Reconcile(failure.error))
        }
    }
}

/// Runs against a [`idch::test_support::FakeCloud`] persisted at `path`.
#[cfg(feature = "test-backdoors")]
async fn converge_fake(
    path: &Path,
    page_size: u32,
    desired: &DesiredState,
    check: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    use idch::test_support::FakeCloud;

    let raw = fs::read_to_string(path).map_err(|err| unreadable(path, &err))?;
    let saved = serde_json::from_str(&raw).map_err(|err| unreadable(path, &err))?;
    let cloud = FakeCloud::from_snapshot(saved).map_err(|err| unreadable(path, &err))?;
    let outcome = converge(&cloud, page_size, desired, check, out).await;
    fs::write(path, cloud.snapshot().to_string()).map_err(|err| unreadable(path, &err))?;
    outcome
}

fn unreadable(path: &Path, err: &dyn std::fmt::Display) -> CliError {
    CliError::Input(format!("{}: {err}", path.display()))
}

fn desired_state(
    command: Command,
    explicit: Option<&str>,
    fallback: Option<Location>,
) -> Result<DesiredState, CliError> {
    match command {
        Command::Apply(ApplyCommand { file }) => {
            let document = fs::read_to_string(&file).map_err(|err| unreadable(&file, &err))?;
            Ok(DesiredState::from_json(&document)?)
        }
        Command::Network(NetworkCommand { name, state }) => {
            let location = resolve_location(explicit, fallback)?;
            Ok(DesiredState::Network(
                NetworkSpec::present(name, location).with_state(state.parse()?),
            ))
        }
        Command::Vm(args) => {
            let location = resolve_location(explicit, fallback)?;
            Ok(DesiredState::Vm(vm_spec(args, location)?))
        }
        Command::FloatingIp(FloatingIpCommand {
            name,
            private_ipv4,
            vm_uuid,
            vm_name,
            state,
        }) => Ok(DesiredState::FloatingIp(FloatingIpSpec {
            location: resolve_location(explicit, fallback)?,
            name,
            private_ipv4,
            vm_uuid,
            vm_name,
            state: state.parse()?,
        })),
        Command::BlockStorage(BlockStorageCommand {
            name,
            vm_name,
            size,
            state,
        }) => Ok(DesiredState::BlockStorage(BlockStorageSpec {
            name,
            location: resolve_location(explicit, fallback)?,
            vm_name,
            size,
            state: state.parse()?,
        })),
    }
}

fn vm_spec(args: VmCommand, location: Location) -> Result<VmSpec, CliError> {
    Ok(VmSpec {
        network_name: args.network_name,
        os_name: args.os_name,
        os_version: args.os_version,
        vcpu: args.vcpu,
        ram: args.ram,
        disks: args.disks,
        username: args.username,
        password: args.password.map(Secret::new),
        remove_public_ipv4: args.remove_public_ipv4,
        state: args.state.parse()?,
        ..VmSpec::named(args.name, location)
    })
}

fn resolve_location(
    explicit: Option<&str>,
    fallback: Option<Location>,
) -> Result<Location, CliError> {
    match explicit {
        Some(raw) => Ok(raw.parse()?),
        None => fallback.ok_or_else(|| {
            CliError::Input(String::from(
                "no location given: pass --location or set IDCH_DEFAULT_LOCATION",
            ))
        }),
    }
}

fn write_result(out: &mut impl Write, result: &ReconcileResult) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(result).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(out, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
}
