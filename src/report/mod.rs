mod aggregate;
mod evidence;
mod records;

pub use aggregate::AggregationEngine;
pub use evidence::{Evidence, EvidenceKind};
pub use records::{
    AnalysisSkipped, AppIdentity, AppReport, ClassRecord, MethodRecord, NativeLibraryRecord,
    ScanCounters,
};
