use crate::errors::VcrError;
use crate::logging::{DEFAULT_DISK_BUDGET_BYTES, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::runtime::FileSystem;
use crate::types::Mode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type EnvMap = BTreeMap<String, String>;

pub const ENV_MODE: &str = "VCR_MODE";
pub const ENV_DIR: &str = "VCR_DIR";

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub mode: Option<Mode>,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VcrConfig {
    pub storage: StorageConfig,
    pub recorder: RecorderConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecorderConfig {
    pub mode: Mode,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

impl Default for VcrConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                dir: PathBuf::from("testdata/fixtures"),
            },
            recorder: RecorderConfig {
                mode: Mode::Replay,
                debug: false,
            },
            transport: TransportConfig::default(),
            logging: LoggingConfig {
                path: None,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
                budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
            },
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: concat!("vcr/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialVcrConfig {
    storage: Option<PartialStorageConfig>,
    recorder: Option<PartialRecorderConfig>,
    transport: Option<PartialTransportConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialStorageConfig {
    dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialRecorderConfig {
    mode: Option<String>,
    debug: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialTransportConfig {
    timeout_seconds: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLoggingConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
    budget_bytes: Option<u64>,
}

/// Builds the effective config: defaults, then the TOML file, then
/// `VCR_MODE`/`VCR_DIR`, then command line flags.
pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
    env: &EnvMap,
    fs: &dyn FileSystem,
) -> Result<VcrConfig, VcrError> {
    let mut cfg = VcrConfig::default();

    if let Some(path) = &overrides.config_path {
        let bytes = fs.read(path)?.ok_or_else(|| {
            VcrError::InvalidConfig(format!("config file {} not found", path.display()))
        })?;
        let text =
            String::from_utf8(bytes).map_err(|e| VcrError::ConfigParse(e.to_string()))?;
        let partial: PartialVcrConfig =
            toml::from_str(&text).map_err(|e| VcrError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial)?;
    }

    apply_env_overrides(&mut cfg, env)?;
    apply_cli_overrides(&mut cfg, overrides);

    cfg.storage.dir = absolutize_path(process_cwd, &cfg.storage.dir);
    cfg.logging.path = cfg
        .logging
        .path
        .as_deref()
        .filter(|path| !path.as_os_str().is_empty())
        .map(|path| absolutize_path(process_cwd, path));

    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut VcrConfig, partial: PartialVcrConfig) -> Result<(), VcrError> {
    if let Some(storage) = partial.storage {
        if let Some(dir) = storage.dir {
            cfg.storage.dir = dir;
        }
    }

    if let Some(recorder) = partial.recorder {
        if let Some(mode) = recorder.mode {
            cfg.recorder.mode = Mode::parse(&mode)?;
        }
        if let Some(debug) = recorder.debug {
            cfg.recorder.debug = debug;
        }
    }

    if let Some(transport) = partial.transport {
        if let Some(value) = transport.timeout_seconds {
            cfg.transport.timeout_seconds = value;
        }
        if let Some(value) = transport.user_agent {
            cfg.transport.user_agent = value;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(value) = logging.path {
            cfg.logging.path = Some(value);
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
        if let Some(value) = logging.budget_bytes {
            cfg.logging.budget_bytes = value;
        }
    }

    Ok(())
}

fn apply_env_overrides(cfg: &mut VcrConfig, env: &EnvMap) -> Result<(), VcrError> {
    if let Some(mode) = env.get(ENV_MODE).filter(|v| !v.trim().is_empty()) {
        cfg.recorder.mode = Mode::parse(mode)?;
    }
    if let Some(dir) = env.get(ENV_DIR).filter(|v| !v.trim().is_empty()) {
        cfg.storage.dir = PathBuf::from(dir);
    }
    Ok(())
}

fn apply_cli_overrides(cfg: &mut VcrConfig, overrides: &CliOverrides) {
    if let Some(dir) = &overrides.dir {
        cfg.storage.dir = dir.clone();
    }
    if let Some(mode) = overrides.mode {
        cfg.recorder.mode = mode;
    }
    if overrides.debug {
        cfg.recorder.debug = true;
    }
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

fn validate_config(cfg: &VcrConfig) -> Result<(), VcrError> {
    if cfg.storage.dir.as_os_str().is_empty() {
        return Err(VcrError::InvalidConfig(
            "storage.dir must not be empty".to_string(),
        ));
    }
    if cfg.transport.timeout_seconds == 0 {
        return Err(VcrError::InvalidConfig(
            "transport.timeout_seconds must be greater than zero".to_string(),
        ));
    }
    if cfg.transport.user_agent.trim().is_empty() {
        return Err(VcrError::InvalidConfig(
            "transport.user_agent must not be empty".to_string(),
        ));
    }
    Ok(())
}
