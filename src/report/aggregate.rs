use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::{AppIdentity, AppReport, ClassRecord, Evidence, ScanCounters};
use crate::managed::ManagedAnalysis;
use crate::native::NativeAnalysis;
use crate::registry::AlgorithmRegistry;

/// Merges analyzer outputs into one [`AppReport`] and assigns each class
/// and method its primary algorithm.
///
/// Primary algorithm policy: the strongest evidence kind present decides
/// (identifier match, then constant match, then string reference). Within
/// that kind, the algorithm registered earliest wins.
pub struct AggregationEngine<'r> {
    registry: &'r AlgorithmRegistry,
}

impl<'r> AggregationEngine<'r> {
    pub fn new(registry: &'r AlgorithmRegistry) -> Self {
        Self { registry }
    }

    pub fn merge<I>(
        &self,
        identity: AppIdentity,
        managed: I,
        native: NativeAnalysis,
        elapsed: Duration,
    ) -> AppReport
    where
        I: IntoIterator<Item = ManagedAnalysis>,
    {
        let mut counters = ScanCounters {
            libraries_scanned: native.libraries_scanned,
            elapsed,
            ..ScanCounters::default()
        };

        let mut classes: BTreeMap<String, ClassRecord> = BTreeMap::new();
        for pass in managed {
            counters.classes_scanned += pass.classes_scanned;
            counters.methods_scanned += pass.methods_scanned;
            for record in pass.classes {
                match classes.get_mut(record.name()) {
                    Some(existing) => existing.merge(record),
                    None => {
                        classes.insert(record.name().to_string(), record);
                    }
                }
            }
        }

        let classes: Vec<ClassRecord> = classes
            .into_values()
            .filter_map(|mut class| {
                class.retain_methods_with_evidence();
                if !class.has_evidence() {
                    return None;
                }
                for method in class.methods_mut() {
                    let primary = self.primary_algorithm(method.evidence().iter());
                    method.set_primary_algorithm(primary);
                }
                let primary = self.primary_algorithm(class.all_evidence());
                class.set_primary_algorithm(primary);
                Some(class)
            })
            .collect();

        debug!(
            app = %identity.file_name,
            classes = classes.len(),
            libraries = native.libraries.len(),
            skipped = native.skipped.len(),
            "report assembled"
        );

        AppReport::new(identity, classes, native.libraries, native.skipped, counters)
    }

    pub fn primary_algorithm<'e, I>(&self, evidence: I) -> Option<String>
    where
        I: IntoIterator<Item = &'e Evidence>,
    {
        evidence
            .into_iter()
            .min_by_key(|e| {
                (
                    e.kind(),
                    self.registry.priority(e.algorithm()).unwrap_or(usize::MAX),
                    e.algorithm().to_string(),
                )
            })
            .map(|e| e.algorithm().to_string())
    }
}
