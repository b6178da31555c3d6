use std::time::Duration;
use thiserror::Error;

use super::InputFormatError;

/// Unit-scoped analysis failures. None of these are fatal to a batch.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    InputFormat(#[from] InputFormatError),

    #[error("analysis exceeded its deadline of {}s", budget.as_secs())]
    Timeout { budget: Duration },

    #[error("unexpected analysis failure: {message}")]
    Unexpected { message: String },
}

impl AnalysisError {
    pub fn timeout(budget: Duration) -> Self {
        Self::Timeout { budget }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
