use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("failed to write file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize record for '{path}': {message}")]
    SerializeError { path: PathBuf, message: String },
}

impl IoError {
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteError {
            path: path.into(),
            source,
        }
    }

    pub fn serialize_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SerializeError {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_error_display() {
        let err = IoError::serialize_error("/out/native.jsonl", "key must be a string");
        assert_eq!(
            err.to_string(),
            "failed to serialize record for '/out/native.jsonl': key must be a string"
        );
    }

    #[test]
    fn test_write_error_display() {
        let source = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = IoError::write_error("/out/summary.jsonl", source);
        assert_eq!(
            err.to_string(),
            "failed to write file '/out/summary.jsonl': disk full"
        );
    }
}
