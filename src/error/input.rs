use std::path::PathBuf;
use thiserror::Error;

/// An application archive, embedded binary or decompiled-code document is
/// not a valid instance of its expected format.
#[derive(Error, Debug)]
pub enum InputFormatError {
    #[error("not an application archive: {path}: {message}")]
    BadArchive { path: PathBuf, message: String },

    #[error("not a valid {expected} binary: {name}: {message}")]
    BadBinary {
        name: String,
        expected: String,
        message: String,
    },

    #[error("invalid decompiled code document '{path}': {message}")]
    BadDecompiledCode { path: PathBuf, message: String },
}

impl InputFormatError {
    pub fn bad_archive(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::BadArchive {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn bad_binary(
        name: impl Into<String>,
        expected: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::BadBinary {
            name: name.into(),
            expected: expected.into(),
            message: message.into(),
        }
    }

    pub fn bad_decompiled_code(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::BadDecompiledCode {
            path: path.into(),
            message: message.into(),
        }
    }
}
