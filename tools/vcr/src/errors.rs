use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcrError {
    #[error("invalid mode: {0}")]
    InvalidMode(String),
    #[error("fixture not found: {}", .0.display())]
    FixtureNotFound(PathBuf),
    #[error("malformed fixture: {0}")]
    MalformedFixture(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
}
