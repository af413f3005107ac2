//! Command-line interface definitions for the `metal-provider` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::{Args, Parser};

/// Top-level CLI for the `metal-provider` binary.
#[derive(Debug, Parser)]
#[command(
    name = "metal-provider",
    about = "Create, delete, inspect, and list Equinix Metal machines",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create a device for a machine.
    #[command(name = "create", about = "Create a device for a machine")]
    Create(MachineArgs),
    /// Delete the device behind a provider ID.
    #[command(name = "delete", about = "Delete the device behind a provider ID")]
    Delete(MachineArgs),
    /// Report the device behind a provider ID.
    #[command(name = "status", about = "Report the device behind a provider ID")]
    Status(MachineArgs),
    /// List the devices owned by a machine class.
    #[command(name = "list", about = "List the devices owned by a machine class")]
    List(ClassArgs),
}

/// Documents every subcommand reads.
#[derive(Debug, Args)]
pub(crate) struct ClassArgs {
    /// Path to the machine class JSON document.
    #[arg(long, value_name = "PATH")]
    pub(crate) class: Utf8PathBuf,
    /// Path to the secret JSON document (an object of string values).
    #[arg(long, value_name = "PATH")]
    pub(crate) secret: Utf8PathBuf,
}

/// Arguments for subcommands acting on a single machine.
#[derive(Debug, Args)]
pub(crate) struct MachineArgs {
    /// Machine class and secret documents.
    #[command(flatten)]
    pub(crate) inputs: ClassArgs,
    /// Machine name; used as the device hostname on create.
    #[arg(long, value_name = "NAME")]
    pub(crate) machine: String,
    /// Provider ID issued by a previous create (required for delete and status).
    #[arg(long, value_name = "ID")]
    pub(crate) provider_id: Option<String>,
}
