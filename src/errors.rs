use std::io;

use thiserror::Error;

/// Error type for loading, preparing and exporting the regional accounts dataset.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("data unavailable from '{origin}': {reason}")]
    DataUnavailable { origin: String, reason: String },
    #[error("dataset is missing required column '{0}'")]
    MissingColumn(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DashboardError {
    pub(crate) fn unavailable(origin: impl Into<String>, reason: impl ToString) -> Self {
        DashboardError::DataUnavailable {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
