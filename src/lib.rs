/// APK Crypto Detect
///
/// Heuristic detection of cryptographic algorithm usage in Android
/// application packages. Managed code is attributed to algorithms from its
/// identifiers, embedded constants and referenced string literals; native
/// libraries from their symbols, data-section constants and file names.
pub mod batch;
pub mod cli;
pub mod deadline;
pub mod detector;
pub mod error;
pub mod logging;
pub mod managed;
pub mod matcher;
pub mod native;
pub mod output;
pub mod package;
pub mod registry;
pub mod report;
pub mod signature;
pub mod utils;

pub use batch::{BatchConfig, BatchRunner, BatchSummary, UnitOutcome, UnitStatus};
pub use deadline::Deadline;
pub use detector::{AnalysisOptions, Detector};
pub use error::{Error, Result};
pub use registry::{AlgorithmRegistry, RuleSet};
pub use report::{AppReport, Evidence};
