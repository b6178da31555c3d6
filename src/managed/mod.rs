mod source;

pub use source::{ClassHandle, DecompiledPackage, MethodHandle, MethodRef, StringXrefTable};

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

use crate::deadline::Deadline;
use crate::error::AnalysisError;
use crate::matcher::{MatchContext, NameMatcher};
use crate::registry::AlgorithmRegistry;
use crate::report::{ClassRecord, Evidence};
use crate::signature::ByteSignatureScanner;

/// String-table entries processed between deadline checks.
const STRING_CHECK_INTERVAL: usize = 256;

/// Output of one managed-code pass.
#[derive(Debug, Clone, Default)]
pub struct ManagedAnalysis {
    /// Only classes carrying evidence, ordered by class name.
    pub classes: Vec<ClassRecord>,
    pub classes_scanned: usize,
    pub methods_scanned: usize,
}

/// Attributes classes and methods to algorithms from their names, the
/// constants embedded in their code and the string literals they reference.
pub struct ManagedCodeAnalyzer<'a> {
    registry: &'a AlgorithmRegistry,
    matcher: &'a NameMatcher,
}

impl<'a> ManagedCodeAnalyzer<'a> {
    pub fn new(registry: &'a AlgorithmRegistry, matcher: &'a NameMatcher) -> Self {
        Self { registry, matcher }
    }

    pub fn analyze(
        &self,
        classes: &[ClassHandle],
        strings: &StringXrefTable,
        deadline: &Deadline,
    ) -> Result<ManagedAnalysis, AnalysisError> {
        let mut records: BTreeMap<String, ClassRecord> = BTreeMap::new();
        let mut external_methods: BTreeSet<(&str, &str)> = BTreeSet::new();
        let mut classes_scanned = 0;
        let mut methods_scanned = 0;

        for class in classes {
            deadline.check()?;
            classes_scanned += 1;

            let mut record = ClassRecord::new(&class.name);
            if let Some(algorithm) = self.matcher.match_name(&class.name, MatchContext::Identifier) {
                record.add_evidence(Evidence::name_match(algorithm));
            }

            for method in &class.methods {
                methods_scanned += 1;
                if method.external {
                    external_methods.insert((class.name.as_str(), method.name.as_str()));
                }
                let evidence = self.method_evidence(method);
                if evidence.is_empty() {
                    continue;
                }
                let entry = record.method_entry(&method.name, method.external);
                for item in evidence {
                    entry.add_evidence(item);
                }
            }

            if record.has_evidence() {
                trace!(class = %class.name, "class carries evidence");
                match records.get_mut(&class.name) {
                    Some(existing) => existing.merge(record),
                    None => {
                        records.insert(class.name.clone(), record);
                    }
                }
            }
        }

        let mut string_hits = 0usize;
        for (index, (value, locations)) in strings.iter().enumerate() {
            if index % STRING_CHECK_INTERVAL == 0 {
                deadline.check()?;
            }
            let Some(algorithm) = self.matcher.match_name(value, MatchContext::Freeform) else {
                continue;
            };
            string_hits += 1;
            for location in locations {
                let external = external_methods
                    .contains(&(location.class.as_str(), location.method.as_str()));
                records
                    .entry(location.class.clone())
                    .or_insert_with(|| ClassRecord::new(&location.class))
                    .method_entry(&location.method, external)
                    .add_evidence(Evidence::string_reference(algorithm, value));
            }
        }

        debug!(
            classes_scanned,
            methods_scanned,
            string_hits,
            classes_with_evidence = records.len(),
            "managed code analyzed"
        );

        Ok(ManagedAnalysis {
            classes: records.into_values().collect(),
            classes_scanned,
            methods_scanned,
        })
    }

    fn method_evidence(&self, method: &MethodHandle) -> Vec<Evidence> {
        let mut evidence = Vec::new();
        if let Some(algorithm) = self.matcher.match_name(&method.name, MatchContext::Identifier) {
            evidence.push(Evidence::name_match(algorithm));
        }

        match method.body() {
            Some(code) => {
                for (algorithm, constant) in self.registry.constants() {
                    if ByteSignatureScanner::contains_in(code, &constant.bytes) {
                        evidence.push(Evidence::constant_match(&algorithm.name, &constant.name));
                    }
                }
            }
            None => trace!(method = %method.name, "no resolvable body"),
        }
        evidence
    }
}
