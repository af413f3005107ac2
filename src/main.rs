//! Binary entry point for the `metal-provider` CLI.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use clap::Parser;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use metal_provider::{
    ConfigError, CreateMachineRequest, DeleteMachineRequest, GetMachineStatusRequest,
    ListMachinesRequest, Machine, MachineClass, MachineError, MetalConfig, MetalSessionProvider,
    Provider, Secret, SessionProvider,
};

mod cli;

use cli::{ClassArgs, Cli, MachineArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to read {path}: {message}")]
    Read { path: Utf8PathBuf, message: String },
    #[error("failed to parse {path}: {message}")]
    Parse { path: Utf8PathBuf, message: String },
    #[error("--provider-id is required for {0}")]
    MissingProviderId(&'static str),
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error("failed to render output: {0}")]
    Output(String),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = MetalConfig::load_without_cli_args()?;
    let provider = Provider::new(MetalSessionProvider::new(&config)?);
    let output = run(&provider, cli).await?;
    write_output(io::stdout(), &output)
}

async fn run<S: SessionProvider>(
    provider: &Provider<S>,
    cli: Cli,
) -> Result<serde_json::Value, CliError> {
    match cli {
        Cli::Create(args) => {
            let (machine, machine_class, secret) = load_machine_inputs(args)?;
            let response = provider
                .create_machine(&CreateMachineRequest {
                    machine,
                    machine_class,
                    secret: Some(secret),
                })
                .await?;
            to_json(&response)
        }
        Cli::Delete(args) => {
            let (machine, machine_class, secret) = load_machine_inputs(args)?;
            require_provider_id(&machine, "delete")?;
            let response = provider
                .delete_machine(&DeleteMachineRequest {
                    machine,
                    machine_class,
                    secret: Some(secret),
                })
                .await?;
            to_json(&response)
        }
        Cli::Status(args) => {
            let (machine, machine_class, secret) = load_machine_inputs(args)?;
            require_provider_id(&machine, "status")?;
            let response = provider
                .get_machine_status(&GetMachineStatusRequest {
                    machine,
                    machine_class,
                    secret: Some(secret),
                })
                .await?;
            to_json(&response)
        }
        Cli::List(args) => {
            let (machine_class, secret) = load_class_inputs(&args)?;
            let response = provider
                .list_machines(&ListMachinesRequest {
                    machine_class,
                    secret: Some(secret),
                })
                .await?;
            to_json(&response)
        }
    }
}

fn load_machine_inputs(args: MachineArgs) -> Result<(Machine, MachineClass, Secret), CliError> {
    let (machine_class, secret) = load_class_inputs(&args.inputs)?;
    let machine = Machine::new(args.machine).with_provider_id(args.provider_id.unwrap_or_default());
    Ok((machine, machine_class, secret))
}

fn load_class_inputs(args: &ClassArgs) -> Result<(MachineClass, Secret), CliError> {
    let machine_class = read_json(&args.class)?;
    let values: BTreeMap<String, String> = read_json(&args.secret)?;
    Ok((machine_class, values.into_iter().collect()))
}

fn require_provider_id(machine: &Machine, command: &'static str) -> Result<(), CliError> {
    if machine.provider_id.trim().is_empty() {
        return Err(CliError::MissingProviderId(command));
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, CliError> {
    let contents = read_to_string_ambient(path).map_err(|err| CliError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    serde_json::from_str(&contents).map_err(|err| CliError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn read_to_string_ambient(path: &Utf8Path) -> io::Result<String> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    Dir::open_ambient_dir(parent, ambient_authority())?.read_to_string(file_name)
}

fn to_json(response: &impl Serialize) -> Result<serde_json::Value, CliError> {
    serde_json::to_value(response).map_err(|err| CliError::Output(err.to_string()))
}

fn write_output(mut target: impl Write, output: &serde_json::Value) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(output).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
