//! Error taxonomy surfaced to callers of the core

use std::time::Duration;

use thiserror::Error;

use crate::ports::{FetchError, HistoryError};

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStep {
    Validation,
    Filtering,
    Scoring,
    Sorting,
    TimeWindow,
    Weights,
}

impl std::fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Filtering => "filtering",
            Self::Scoring => "scoring",
            Self::Sorting => "sorting",
            Self::TimeWindow => "time_window",
            Self::Weights => "weights",
        };
        f.write_str(name)
    }
}

/// Failure inside the processing pipeline or weight validation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{step} failed: {message}")]
pub struct DataProcessingError {
    pub step: ProcessingStep,
    pub message: String,
}

impl DataProcessingError {
    pub fn new(step: ProcessingStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

/// Errors returned by the analysis and collection entry points
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("API error: {message}")]
    Api {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    #[error("Rate limited, retry after: {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    DataProcessing(#[from] DataProcessingError),
    #[error("{0}")]
    Business(String),
    #[error("Storage error: {0}")]
    Storage(#[from] HistoryError),
}

impl TrackerError {
    /// Stable kind name for reporting at the outer boundary
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Api { .. } => "api_error",
            Self::RateLimit { .. } => "rate_limit_error",
            Self::NotFound(_) => "not_found_error",
            Self::DataProcessing(_) => "data_processing_error",
            Self::Business(_) => "business_error",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl From<FetchError> for TrackerError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Api { message, source } => Self::Api { message, source },
            FetchError::RateLimited { retry_after } => Self::RateLimit { retry_after },
            FetchError::NotFound { resource } => Self::NotFound(resource),
            FetchError::Malformed { message, source } => Self::Api {
                message: format!("malformed response: {}", message),
                source,
            },
        }
    }
}
