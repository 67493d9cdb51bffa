//! Record and replay HTTP responses as fixture files so network-dependent
//! tests run deterministically.
//!
//! The library entry point is [`recorder::Vcr`]; the `vcr` binary wraps it
//! for recording, replaying and inspecting fixtures from a shell.

pub mod codec;
pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod log_retention;
pub mod logging;
pub mod recorder;
pub mod runtime;
pub mod storage;
pub mod types;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand, ValueEnum};
use config::{load_config, CliOverrides, EnvMap, VcrConfig};
use errors::VcrError;
use fingerprint::{post_form_hash, url_hash};
use logging::structured_fallback_line;
use recorder::Vcr;
use runtime::{ProductionFileSystem, VcrRuntime};
use storage::{list_fixtures, FixtureId};
use types::{FormData, Mode, OperationKind, Response};

#[derive(Debug, Clone, Parser)]
#[command(name = "vcr")]
#[command(about = "Record and replay HTTP responses as fixture files")]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
    #[arg(long, global = true)]
    pub dir: Option<std::path::PathBuf>,
    #[arg(long, global = true, value_enum)]
    pub mode: Option<CliMode>,
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// GET a URL through the recorder and print the response.
    Get { url: String },
    /// POST urlencoded form fields through the recorder and print the response.
    PostForm {
        url: String,
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Decode a fixture file and print it.
    Show { file: std::path::PathBuf },
    /// List fixtures in the storage directory.
    List,
    /// Print the hash and seq-0 file name a call would use.
    Fingerprint {
        #[command(subcommand)]
        target: FingerprintTarget,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum FingerprintTarget {
    Get {
        url: String,
    },
    PostForm {
        url: String,
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliMode {
    Replay,
    Record,
    Live,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Replay => Mode::Replay,
            CliMode::Record => Mode::Record,
            CliMode::Live => Mode::Live,
        }
    }
}

pub fn run() -> Result<i32, VcrError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let env = std::env::vars_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| VcrError::Storage(e.to_string()))?;
    let Some(cli) = parse_cli(&args)? else {
        return Ok(0);
    };
    let cfg = load_config(
        &overrides_from(&cli),
        &cwd,
        &env_to_map(&env),
        &ProductionFileSystem,
    )?;
    let runtime = VcrRuntime::production(&cfg.transport)?;
    run_command(&cli, &cfg, &runtime)
}

/// Same as [`run`] with injected collaborators.
pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    env: &[(std::ffi::OsString, std::ffi::OsString)],
    cwd: &std::path::Path,
    runtime: &VcrRuntime,
) -> Result<i32, VcrError> {
    let Some(cli) = parse_cli(args)? else {
        return Ok(0);
    };
    let cfg = load_config(
        &overrides_from(&cli),
        cwd,
        &env_to_map(env),
        runtime.file_system.as_ref(),
    )?;
    run_command(&cli, &cfg, runtime)
}

fn parse_cli(args: &[std::ffi::OsString]) -> Result<Option<Cli>, VcrError> {
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                Ok(None)
            }
            _ => Err(VcrError::Cli(error.to_string())),
        },
    }
}

fn overrides_from(cli: &Cli) -> CliOverrides {
    CliOverrides {
        config_path: cli.config.clone(),
        dir: cli.dir.clone(),
        mode: cli.mode.map(Into::into),
        debug: cli.debug,
    }
}

fn run_command(cli: &Cli, cfg: &VcrConfig, runtime: &VcrRuntime) -> Result<i32, VcrError> {
    match &cli.command {
        CliCommand::Get { url } => {
            let vcr = Vcr::from_config(cfg, runtime);
            let response = vcr.get(url)?;
            print_response(runtime, &response)?;
        }
        CliCommand::PostForm { url, fields } => {
            let form = parse_form(fields)?;
            let vcr = Vcr::from_config(cfg, runtime);
            let response = vcr.post_form(url, &form)?;
            print_response(runtime, &response)?;
        }
        CliCommand::Show { file } => {
            let bytes = runtime
                .file_system
                .read(file)?
                .ok_or_else(|| VcrError::FixtureNotFound(file.clone()))?;
            let response = codec::decode(&bytes)?;
            print_response(runtime, &response)?;
        }
        CliCommand::List => {
            let fixtures = list_fixtures(runtime.file_system.as_ref(), &cfg.storage.dir)?;
            for (path, id) in fixtures {
                let status = match runtime.file_system.read(&path) {
                    Ok(Some(bytes)) => match codec::decode(&bytes) {
                        Ok(response) => response.status.to_string(),
                        Err(_) => "malformed".to_string(),
                    },
                    Ok(None) => "missing".to_string(),
                    Err(_) => "unreadable".to_string(),
                };
                runtime.terminal.write_line(&structured_fallback_line(
                    id.kind.as_str(),
                    id.seq,
                    &format!("hash={} status={status}", short_hash(&id.hash)),
                ))?;
            }
        }
        CliCommand::Fingerprint { target } => {
            let (kind, hash) = match target {
                FingerprintTarget::Get { url } => (OperationKind::Get, url_hash(url)),
                FingerprintTarget::PostForm { url, fields } => {
                    (OperationKind::PostForm, post_form_hash(url, &parse_form(fields)?))
                }
            };
            runtime.terminal.write_line(&hash)?;
            runtime
                .terminal
                .write_line(&FixtureId::new(kind, hash.as_str(), 0).file_name())?;
        }
    }
    Ok(0)
}

fn parse_form(fields: &[String]) -> Result<FormData, VcrError> {
    let mut form = FormData::new();
    for raw in fields {
        let (key, value) = FormData::parse_field(raw)?;
        form.append(key, value);
    }
    Ok(form)
}

fn print_response(runtime: &VcrRuntime, response: &Response) -> Result<(), VcrError> {
    let wire = codec::encode(response)?;
    runtime
        .terminal
        .write_line(String::from_utf8_lossy(&wire).trim_end_matches(['\r', '\n']))
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

pub fn render_help() -> String {
    let mut cmd = Cli::command();
    cmd.render_long_help().to_string()
}

fn env_to_map(env: &[(std::ffi::OsString, std::ffi::OsString)]) -> EnvMap {
    let mut map = EnvMap::new();
    for (key, value) in env {
        if let (Some(key), Some(value)) = (key.to_str(), value.to_str()) {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}
