use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use crate::batch::BatchConfig;
use crate::deadline::DEFAULT_TIMEOUT_SECONDS;
use crate::detector::AnalysisOptions;
use crate::package::DEFAULT_MAX_LIBRARY_SIZE;

/// Extension of application archives picked up when walking directories.
pub const APP_EXTENSION: &str = "apk";

#[derive(Parser, Debug)]
#[command(name = "apk-crypto-detect")]
#[command(
    about = "Detect cryptographic algorithm usage in Android application packages",
    long_about = None
)]
pub struct Args {
    /// Application archives, or directories searched recursively for *.apk
    #[arg(value_name = "APK", required = true)]
    pub apps: Vec<PathBuf>,

    /// Directory receiving managed.jsonl, native.jsonl, summary.jsonl and the log
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Rules file (JSON or YAML) overriding parts of the bundled rules
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Directory holding <app stem>.json decompiled-code documents
    #[arg(long, value_name = "DIR")]
    pub classes_dir: Option<PathBuf>,

    /// Only analyse embedded native libraries
    #[arg(long)]
    pub native_only: bool,

    /// Per-application time budget in seconds (0 disables it)
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout: u64,

    /// Number of applications analysed in parallel
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Largest embedded library read into memory, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_LIBRARY_SIZE)]
    pub max_library_size: u64,

    /// Also search whole library files for constants and log their offsets
    #[arg(long)]
    pub raw_search: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        for app in &self.apps {
            validate_path(app)?;
        }
        if let Some(ref rules_path) = self.rules {
            if !rules_path.is_file() {
                anyhow::bail!("Rules file does not exist: {}", rules_path.display());
            }
        }
        if let Some(ref classes_dir) = self.classes_dir {
            if !classes_dir.is_dir() {
                anyhow::bail!("Classes directory does not exist: {}", classes_dir.display());
            }
        }
        if self.jobs == Some(0) {
            anyhow::bail!("--jobs must be at least 1");
        }
        if self.output.exists() && !self.output.is_dir() {
            anyhow::bail!("Output path is not a directory: {}", self.output.display());
        }
        Ok(())
    }

    /// Every application to analyse: files as given, directories expanded
    /// to their `*.apk` files in sorted order.
    pub fn collect_apps(&self) -> Result<Vec<PathBuf>> {
        let mut apps = Vec::new();
        for path in &self.apps {
            if path.is_dir() {
                apps.extend(walk_apps(path)?);
            } else {
                apps.push(path.clone());
            }
        }
        Ok(apps)
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
            native_only: self.native_only,
            raw_search: self.raw_search,
            max_library_size: self.max_library_size,
            classes_dir: self.classes_dir.clone(),
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            jobs: self.jobs,
            options: self.analysis_options(),
        }
    }
}

pub fn walk_apps(root: &Path) -> Result<Vec<PathBuf>> {
    let mut apps = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Cannot read directory: {}", root.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == APP_EXTENSION)
        {
            apps.push(entry.into_path());
        }
    }
    Ok(apps)
}

pub fn validate_path(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        std::fs::metadata(path).with_context(|| format!("Cannot read file: {}", path.display()))?;
    } else if path.is_dir() {
        std::fs::metadata(path)
            .with_context(|| format!("Cannot read directory: {}", path.display()))?;
    } else {
        anyhow::bail!("Path is neither a file nor a directory: {}", path.display());
    }

    Ok(())
}
