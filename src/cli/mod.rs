//! Command-line interface definitions for the `idch` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page. It
//! only depends on `clap` and `std`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `idch` binary.
#[derive(Debug, Parser)]
#[command(
    name = "idch",
    about = "Converge IDCloudHost networks, VMs, floating IPs and block storage",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Report what would change without mutating anything.
    #[arg(long, global = true)]
    pub(crate) check: bool,
    /// Location to operate in (jkt01, jkt02, jkt03, sgp01). Falls back to
    /// `default_location` from configuration.
    #[arg(long, global = true, value_name = "LOCATION")]
    pub(crate) location: Option<String>,
    /// Resource to converge.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Resource kinds accepted on the command line.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Converge a VPC network.
    #[command(name = "network")]
    Network(NetworkCommand),
    /// Converge a virtual machine.
    #[command(name = "vm")]
    Vm(VmCommand),
    /// Converge a floating IPv4 address.
    #[command(name = "floating-ip")]
    FloatingIp(FloatingIpCommand),
    /// Converge a block storage disk attached to a VM.
    #[command(name = "block-storage")]
    BlockStorage(BlockStorageCommand),
    /// Converge the resource described by a JSON document.
    #[command(name = "apply")]
    Apply(ApplyCommand),
}

/// Arguments for `idch network`.
#[derive(Debug, Args)]
pub(crate) struct NetworkCommand {
    /// Network name, unique per location.
    #[arg(long)]
    pub(crate) name: String,
    /// `present` or `absent`.
    #[arg(long, default_value = "present")]
    pub(crate) state: String,
}

/// Arguments for `idch vm`.
#[derive(Debug, Args)]
pub(crate) struct VmCommand {
    /// VM name, unique per location.
    #[arg(long)]
    pub(crate) name: String,
    /// Network the VM is created on.
    #[arg(long, value_name = "NETWORK")]
    pub(crate) network_name: Option<String>,
    /// Operating system image, for example `ubuntu`.
    #[arg(long)]
    pub(crate) os_name: Option<String>,
    /// Operating system version, for example `22.04-lts`.
    #[arg(long)]
    pub(crate) os_version: Option<String>,
    /// Number of virtual CPUs.
    #[arg(long)]
    pub(crate) vcpu: Option<u32>,
    /// Memory in MB.
    #[arg(long)]
    pub(crate) ram: Option<u32>,
    /// Primary disk size in GB.
    #[arg(long)]
    pub(crate) disks: Option<u32>,
    /// Login created on the VM.
    #[arg(long)]
    pub(crate) username: Option<String>,
    /// Password of the login. Prefer the environment variable.
    #[arg(long, env = "IDCH_VM_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
    /// Release the VM's floating IP when deleting it.
    #[arg(long)]
    pub(crate) remove_public_ipv4: bool,
    /// `present`, `absent`, `active`, `inactive` or `resize`.
    #[arg(long, default_value = "present")]
    pub(crate) state: String,
}

/// Arguments for `idch floating-ip`.
#[derive(Debug, Args)]
pub(crate) struct FloatingIpCommand {
    /// Informative name of the address.
    #[arg(long)]
    pub(crate) name: Option<String>,
    /// Locate the address by the private address it routes to.
    #[arg(long, conflicts_with = "vm_uuid")]
    pub(crate) private_ipv4: Option<String>,
    /// Locate the address by the VM it is assigned to.
    #[arg(long)]
    pub(crate) vm_uuid: Option<String>,
    /// Assign the address to this VM.
    #[arg(long)]
    pub(crate) vm_name: Option<String>,
    /// `present`, `absent` or `unassign`.
    #[arg(long, default_value = "present")]
    pub(crate) state: String,
}

/// Arguments for `idch block-storage`.
#[derive(Debug, Args)]
pub(crate) struct BlockStorageCommand {
    /// Device name or identifier of the disk.
    #[arg(long)]
    pub(crate) name: String,
    /// VM the disk is attached to.
    #[arg(long)]
    pub(crate) vm_name: String,
    /// Size in GB.
    #[arg(long)]
    pub(crate) size: Option<u32>,
    /// `present` or `absent`.
    #[arg(long, default_value = "present")]
    pub(crate) state: String,
}

/// Arguments for `idch apply`.
#[derive(Debug, Args)]
pub(crate) struct ApplyCommand {
    /// JSON document with a `kind` field (`network`, `vm`, `floating_ip`,
    /// `block_storage`) and the resource options.
    #[arg(long, value_name = "PATH")]
    pub(crate) file: PathBuf,
}
