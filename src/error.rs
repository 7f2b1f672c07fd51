/// Error type shared by the acquisition pipeline and its collaborators
use thiserror::Error;

use crate::models::Channel;

pub type LoggerResult<T> = Result<T, LoggerError>;

#[derive(Debug, Error)]
pub enum LoggerError {
    /// A sensor could not deliver a value this cycle. The cycle is dropped.
    #[error("sensor read failed ({source_name}): {message}")]
    Sensor {
        source_name: &'static str,
        message: String,
    },

    #[error("audio capture failed: {0}")]
    Audio(String),

    #[error("display device error: {0}")]
    Display(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("snapshot is missing a value for channel '{}'", .0.name())]
    IncompleteSnapshot(Channel),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoggerError {
    pub fn sensor(source_name: &'static str, message: impl Into<String>) -> Self {
        LoggerError::Sensor {
            source_name,
            message: message.into(),
        }
    }

    /// Sensor failures cost one cycle; everything else stops the process.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LoggerError::Sensor { .. })
    }
}
