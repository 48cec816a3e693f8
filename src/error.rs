use crate::store::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DreError {
    /// True for every failure caused by the caller's arguments.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidMonth(_))
    }
}

impl From<csv::Error> for DreError {
    fn from(err: csv::Error) -> Self {
        Self::Export(format!("spreadsheet: {}", err))
    }
}

impl From<lopdf::Error> for DreError {
    fn from(err: lopdf::Error) -> Self {
        Self::Export(format!("pdf: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, DreError>;
