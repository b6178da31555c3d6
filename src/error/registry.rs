use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read rules file '{path}': {message}")]
    RulesFileReadError { path: PathBuf, message: String },

    #[error("failed to parse rules file '{path}': {message}")]
    RulesParseError { path: PathBuf, message: String },

    #[error("unsupported rules format: {format} (expected json or yaml)")]
    UnsupportedFormat { format: String },

    #[error("invalid hex in constant '{constant}': {message}")]
    InvalidConstant { constant: String, message: String },

    #[error("invalid packer pattern '{pattern}': {message}")]
    InvalidPackerPattern { pattern: String, message: String },

    #[error("invalid registry: {message}")]
    InvalidSchema { message: String },
}

impl RegistryError {
    pub fn rules_file_read_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::RulesFileReadError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn rules_parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::RulesParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn invalid_constant(constant: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConstant {
            constant: constant.into(),
            message: message.into(),
        }
    }

    pub fn invalid_packer_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPackerPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }
}
