//! Parallel analysis of many applications.
//!
//! Every application is an isolated unit: it either completes and has all
//! its rows written at once, or ends timed out, skipped or failed with only
//! a summary row. No unit can stop the batch.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::detector::{AnalysisOptions, Detector};
use crate::error::{AnalysisError, Error, Result};
use crate::output::ReportSinks;
use crate::report::AppReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Completed,
    TimedOut,
    Skipped,
    Failed,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Completed => "completed",
            UnitStatus::TimedOut => "timed_out",
            UnitStatus::Skipped => "skipped",
            UnitStatus::Failed => "failed",
        }
    }
}

#[derive(Debug)]
pub struct UnitOutcome {
    pub app: PathBuf,
    pub status: UnitStatus,
    /// Present only for completed units.
    pub report: Option<AppReport>,
    pub reason: Option<String>,
    pub elapsed: Duration,
}

impl UnitOutcome {
    pub fn app_name(&self) -> String {
        self.app
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.app.display().to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn record(&mut self, status: UnitStatus) {
        match status {
            UnitStatus::Completed => self.completed += 1,
            UnitStatus::TimedOut => self.timed_out += 1,
            UnitStatus::Skipped => self.skipped += 1,
            UnitStatus::Failed => self.failed += 1,
        }
    }

    fn combine(mut self, other: Self) -> Self {
        self.completed += other.completed;
        self.timed_out += other.timed_out;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self
    }

    pub fn total(&self) -> usize {
        self.completed + self.timed_out + self.skipped + self.failed
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Worker threads; `None` uses rayon's default.
    pub jobs: Option<usize>,
    pub options: AnalysisOptions,
}

pub struct BatchRunner {
    detector: Detector,
    sinks: Option<ReportSinks>,
    options: AnalysisOptions,
    pool: Option<ThreadPool>,
}

impl BatchRunner {
    pub fn new(detector: Detector, config: BatchConfig) -> Result<Self> {
        let pool = match config.jobs {
            Some(jobs) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .thread_name(|i| format!("analysis-{i}"))
                    .build()
                    .map_err(|e| {
                        Error::Analysis(AnalysisError::unexpected(format!(
                            "cannot start worker pool: {e}"
                        )))
                    })?,
            ),
            None => None,
        };

        Ok(Self {
            detector,
            sinks: None,
            options: config.options,
            pool,
        })
    }

    pub fn with_sinks(mut self, sinks: ReportSinks) -> Self {
        self.sinks = Some(sinks);
        self
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn run(&self, apps: &[PathBuf]) -> BatchSummary {
        info!(apps = apps.len(), "starting batch");
        let started = Instant::now();

        let summary = match &self.pool {
            Some(pool) => pool.install(|| self.run_all(apps)),
            None => self.run_all(apps),
        };

        info!(
            completed = summary.completed,
            timed_out = summary.timed_out,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        summary
    }

    fn run_all(&self, apps: &[PathBuf]) -> BatchSummary {
        apps.par_iter()
            .map(|app| {
                let outcome = self.run_unit(app);
                self.flush(&outcome);
                let mut summary = BatchSummary::default();
                summary.record(outcome.status);
                summary
            })
            .reduce(BatchSummary::default, BatchSummary::combine)
    }

    /// Analyse one application. Never panics and never returns an error:
    /// every failure becomes the unit's status.
    pub fn run_unit(&self, app: &Path) -> UnitOutcome {
        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.detector.analyze_app(app, &self.options)
        }));

        let (status, report, reason) = match result {
            Ok(Ok(report)) => (UnitStatus::Completed, Some(report), None),
            Ok(Err(AnalysisError::InputFormat(e))) => {
                warn!(app = %app.display(), error = %e, "skipping application");
                (UnitStatus::Skipped, None, Some(e.to_string()))
            }
            Ok(Err(e @ AnalysisError::Timeout { .. })) => {
                error!(app = %app.display(), error = %e, "application timed out");
                (UnitStatus::TimedOut, None, Some(e.to_string()))
            }
            Ok(Err(e @ AnalysisError::Unexpected { .. })) => {
                error!(app = %app.display(), error = %e, critical = true, "application failed");
                (UnitStatus::Failed, None, Some(e.to_string()))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(app = %app.display(), error = %message, critical = true, "application failed");
                (
                    UnitStatus::Failed,
                    None,
                    Some(AnalysisError::unexpected(message).to_string()),
                )
            }
        };

        UnitOutcome {
            app: app.to_path_buf(),
            status,
            report,
            reason,
            elapsed: started.elapsed(),
        }
    }

    fn flush(&self, outcome: &UnitOutcome) {
        let Some(sinks) = &self.sinks else {
            return;
        };
        if let Err(e) = sinks.write_unit(outcome, &self.detector.rules().registry) {
            error!(app = %outcome.app.display(), error = %e, "failed to write results");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during analysis".to_string()
    }
}
