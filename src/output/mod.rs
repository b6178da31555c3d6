//! Flat JSON Lines rows derived from [`crate::report::AppReport`] and the
//! sinks they are written to.

mod rows;
mod sink;

pub use rows::{managed_rows, native_rows, ManagedRow, NativeRow, SummaryRow};
pub use sink::{JsonlSink, ReportSinks, MANAGED_FILE, NATIVE_FILE, SUMMARY_FILE};
