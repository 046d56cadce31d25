//! The errors that can occur.

use std::path::PathBuf;
use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The possible errors that can occur while running a job.
#[derive(Debug, Error)]
pub enum Error {
    /// A required external binary could not be found.
    #[error("Required binary '{name}' was not found at {path}")]
    MissingBinary { name: String, path: PathBuf },
    /// The job is missing a required field or carries an invalid one.
    #[error("Invalid job: {0}")]
    InvalidJob(String),
    /// A destination folder could not be created or used.
    #[error("An invalid path was provided: {0}")]
    Path(String),
    /// The user stopped the job.
    #[error("Download cancelled by user")]
    Cancelled,

    /// An error occurred while interacting with the file system.
    #[error("An IO error occurred: {0}")]
    IO(#[from] std::io::Error),
    /// An error occurred while running a command.
    #[error("Failed to execute command: {0}")]
    Command(String),
    /// An error occurred while parsing JSON.
    #[error("An error occurred while parsing JSON: {0}")]
    Serde(#[from] serde_json::Error),
    /// An error occurred while reading or writing a tag container.
    #[error("An error occurred while tagging: {0}")]
    Tag(#[from] lofty::error::LoftyError),
    /// An error occurred while fetching cover art.
    #[error("An error occurred while fetching: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// A worker task panicked or was aborted.
    #[error("An error occurred while running the runtime: {0}")]
    Runtime(#[from] tokio::task::JoinError),
    /// The configuration file could not be parsed or written.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
