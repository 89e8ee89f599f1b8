use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DoorsensorError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("History log error at {}: {source}", path.display())]
    History {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed log record: {0}")]
    Parse(#[from] ParseError),

    #[error("Clock skew: last record at {last} is after the current time {now}")]
    ClockSkew { last: i64, now: i64 },

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("System error: {message}")]
    System { message: String },
}

impl DoorsensorError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn history<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::History {
            path: path.into(),
            source,
        }
    }
}

/// Errors decoding one line of the transition log
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected 5 fields, found {found} in line {line:?}")]
    FieldCount { found: usize, line: String },

    #[error("invalid state {value:?}, expected 0 or 1")]
    InvalidState { value: String },

    #[error("invalid seconds since epoch {value:?}")]
    InvalidTimestamp { value: String },
}

/// Errors from the hardware input collaborator
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to export GPIO {pin}: {details}")]
    Export { pin: u32, details: String },

    #[error("Failed to configure GPIO {pin}: {details}")]
    Configure { pin: u32, details: String },

    #[error("Failed to read GPIO {pin}: {details}")]
    Read { pin: u32, details: String },

    #[error("Unexpected GPIO value {0:?}")]
    InvalidValue(String),
}

/// Errors from a notification transport
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("{notifier}: failed to run {program}: {details}")]
    Spawn {
        notifier: String,
        program: String,
        details: String,
    },

    #[error("{notifier}: {program} exited with {status}: {stderr}")]
    ExitStatus {
        notifier: String,
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{notifier}: timed out after {limit:?}")]
    Timeout {
        notifier: String,
        limit: std::time::Duration,
    },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, DoorsensorError>;
