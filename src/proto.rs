use std::io;

pub mod codec;
pub mod command;
pub mod response;
pub mod transport;

#[cfg(test)]
pub mod fake;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("I/O error: {:?}", _0)]
    Io(#[from] io::Error),

    #[error("Transport failed on `{command}`: {source}")]
    Transport {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("No instrument with serial {0:?} found")]
    NotFound(String),

    #[error("Device reported error {code} on `{command}`: {message}")]
    Device {
        command: String,
        code: i32,
        message: String,
    },

    #[error("Unable to parse response to `{command}`: {response:?}")]
    Parse { command: String, response: String },

    #[error("Session was closed")]
    Closed,
    #[error("Connection was closed")]
    Abort,
}

impl ProtoError {
    /// True if the underlying transport gave up waiting on the device.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Io(err) | Self::Transport { source: err, .. } => {
                err.kind() == io::ErrorKind::TimedOut
            }
            _ => false,
        }
    }

    pub(crate) fn transport(command: impl ToString, source: io::Error) -> Self {
        Self::Transport {
            command: command.to_string(),
            source,
        }
    }

    pub(crate) fn parse(command: impl ToString, response: impl Into<String>) -> Self {
        Self::Parse {
            command: command.to_string(),
            response: response.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtoError>;
