//! Crate-level error type for hosts and the CLI

use std::path::PathBuf;

use thiserror::Error;

use crate::interp::{RuntimeError, SafeModeError};

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Config error in {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid argument: {message}")]
    Argument { message: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    SafeMode(#[from] SafeModeError),
}

impl Error {
    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Exit status for the CLI: 2 for usage problems, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Argument { .. } | Self::Config { .. } => 2,
            _ => 1,
        }
    }
}
