use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdfError {
    #[error("Invalid signal '{label}': {reason}")]
    InvalidSignal { label: String, reason: String },

    #[error("Signal table contains no signals")]
    EmptySignalTable,

    #[error("Too many signals for the EDF header: {0}")]
    TooManySignals(usize),

    #[error("Invalid encoder configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot open output {}: {source}", path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Write to output failed: {0}")]
    SinkWrite(#[from] io::Error),

    #[error("Encoding session is closed")]
    SessionClosed,

    #[error("Data record expects {expected} sample batches, got {got}")]
    RecordShape { expected: usize, got: usize },

    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),
}

impl EdfError {
    pub(crate) fn invalid_signal(label: &str, reason: impl Into<String>) -> Self {
        EdfError::InvalidSignal {
            label: label.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EdfError>;
