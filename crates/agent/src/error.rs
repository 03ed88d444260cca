use thiserror::Error;
use tipping_core::{ApplicationError, ParseError};

use crate::llm::BackendError;

/// Why a single tip invocation failed.
///
/// An incomplete intent is not an error; it is reported through
/// `CompletionResult::Incomplete`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TipError {
    #[error("model backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("malformed extraction: {0}")]
    MalformedExtraction(#[from] ParseError),
    #[error("host runtime failure: {0}")]
    Host(String),
}

impl TipError {
    pub(crate) fn host(error: anyhow::Error) -> Self {
        Self::Host(format!("{error:#}"))
    }
}

impl From<BackendError> for TipError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Unavailable(message) => Self::BackendUnavailable(message),
            BackendError::Malformed(error) => Self::MalformedExtraction(error),
        }
    }
}

impl From<TipError> for ApplicationError {
    fn from(error: TipError) -> Self {
        match error {
            TipError::BackendUnavailable(message) => Self::Integration(message),
            TipError::MalformedExtraction(error) => Self::Extraction(error),
            TipError::Host(message) => Self::Host(message),
        }
    }
}
