//! Per-unit analysis deadlines.
//!
//! A [`Deadline`] is created when a unit of work starts and handed to every
//! analysis step of that unit. Steps poll it at safe checkpoints (start of
//! each class, each library) and give up with [`AnalysisError::Timeout`]
//! once the budget is spent; nothing is interrupted from the outside.

use std::time::{Duration, Instant};
use tracing::error;

use crate::error::AnalysisError;

/// Default per-application budget in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget: Some(budget),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self::new(Duration::from_secs(seconds))
    }

    pub fn unlimited() -> Self {
        Self {
            start: Instant::now(),
            budget: None,
        }
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.budget, Some(budget) if self.start.elapsed() > budget)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.budget
            .map(|budget| budget.saturating_sub(self.start.elapsed()))
    }

    pub fn check(&self) -> Result<(), AnalysisError> {
        match self.budget {
            Some(budget) if self.start.elapsed() > budget => {
                error!(
                    budget_secs = budget.as_secs(),
                    elapsed_ms = self.start.elapsed().as_millis() as u64,
                    "deadline exceeded"
                );
                Err(AnalysisError::timeout(budget))
            }
            _ => Ok(()),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::from_seconds(DEFAULT_TIMEOUT_SECONDS)
    }
}
