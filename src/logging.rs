use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::error::IoError;

/// Name of the plain-text log written into the output directory.
pub const LOG_FILE_NAME: &str = "analyse.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
    Trace,
}

impl Verbosity {
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    fn to_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    fn to_filter(self) -> String {
        let level = self.to_level();
        format!("apk_crypto_detect={level}")
    }

    /// The log file records at least debug events whatever the console shows.
    fn file_filter(self) -> String {
        let level = match self {
            Self::Trace => Level::TRACE,
            _ => Level::DEBUG,
        };
        format!("apk_crypto_detect={level}")
    }
}

/// Install the global subscriber: a console layer on stderr (silenced by
/// `Quiet`) and, when `log_file` is given, an uncoloured debug-level log in
/// that file. `RUST_LOG` overrides the verbosity flags on the console only.
pub fn init(verbosity: Verbosity, log_file: Option<&Path>) -> Result<(), IoError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.to_filter()));

    let writer = match verbosity {
        Verbosity::Quiet => BoxMakeWriter::new(std::io::sink),
        _ => BoxMakeWriter::new(std::io::stderr),
    };
    let console = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(verbosity >= Verbosity::Debug)
        .with_line_number(verbosity >= Verbosity::Debug)
        .with_writer(writer)
        .compact();
    let console = if verbosity == Verbosity::Normal {
        console.without_time().boxed()
    } else {
        console.boxed()
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| IoError::write_error(path, e))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_names(true)
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new(verbosity.file_filter())),
            )
        }
        None => None,
    };

    if tracing_subscriber::registry()
        .with(console.with_filter(filter))
        .with(file_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(0, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(2, false), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(3, false), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(10, false), Verbosity::Trace);
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        assert_eq!(Verbosity::from_flags(3, true), Verbosity::Quiet);
    }

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Normal < Verbosity::Verbose);
        assert!(Verbosity::Verbose < Verbosity::Debug);
        assert!(Verbosity::Debug < Verbosity::Trace);
    }

    #[test]
    fn test_filter_targets_this_crate() {
        assert_eq!(Verbosity::Verbose.to_filter(), "apk_crypto_detect=INFO");
    }

    #[test]
    fn test_file_filter_ignores_quiet() {
        assert_eq!(Verbosity::Quiet.file_filter(), "apk_crypto_detect=DEBUG");
        assert_eq!(Verbosity::Normal.file_filter(), "apk_crypto_detect=DEBUG");
        assert_eq!(Verbosity::Trace.file_filter(), "apk_crypto_detect=TRACE");
    }

    #[test]
    fn test_log_file_in_missing_dir_is_error() {
        let err = init(Verbosity::Quiet, Some(Path::new("/nonexistent/dir/analyse.log")));
        assert!(err.is_err());
    }
}
