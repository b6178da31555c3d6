use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::Evidence;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodRecord {
    class_name: String,
    name: String,
    external: bool,
    evidence: BTreeSet<Evidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_algorithm: Option<String>,
}

impl MethodRecord {
    pub fn new(class_name: impl Into<String>, name: impl Into<String>, external: bool) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            external,
            evidence: BTreeSet::new(),
            primary_algorithm: None,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn evidence(&self) -> &BTreeSet<Evidence> {
        &self.evidence
    }

    pub fn primary_algorithm(&self) -> Option<&str> {
        self.primary_algorithm.as_deref()
    }

    /// Set union; returns false when the fact was already present.
    pub fn add_evidence(&mut self, evidence: Evidence) -> bool {
        self.evidence.insert(evidence)
    }

    pub fn merge(&mut self, other: MethodRecord) {
        self.external &= other.external;
        self.evidence.extend(other.evidence);
    }

    pub fn has_evidence(&self) -> bool {
        !self.evidence.is_empty()
    }

    pub(crate) fn set_primary_algorithm(&mut self, algorithm: Option<String>) {
        self.primary_algorithm = algorithm;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassRecord {
    name: String,
    evidence: BTreeSet<Evidence>,
    methods: BTreeMap<String, MethodRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_algorithm: Option<String>,
}

impl ClassRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            evidence: BTreeSet::new(),
            methods: BTreeMap::new(),
            primary_algorithm: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evidence attached to the class identifier itself.
    pub fn evidence(&self) -> &BTreeSet<Evidence> {
        &self.evidence
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodRecord> {
        self.methods.values()
    }

    pub fn method(&self, name: &str) -> Option<&MethodRecord> {
        self.methods.get(name)
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn primary_algorithm(&self) -> Option<&str> {
        self.primary_algorithm.as_deref()
    }

    pub fn add_evidence(&mut self, evidence: Evidence) -> bool {
        self.evidence.insert(evidence)
    }

    /// The record for `name`, created with the given external flag if absent.
    pub fn method_entry(&mut self, name: &str, external: bool) -> &mut MethodRecord {
        let Self {
            name: class_name,
            methods,
            ..
        } = self;
        methods
            .entry(name.to_string())
            .or_insert_with(|| MethodRecord::new(class_name.clone(), name, external))
    }

    pub fn merge(&mut self, other: ClassRecord) {
        self.evidence.extend(other.evidence);
        for (name, method) in other.methods {
            match self.methods.get_mut(&name) {
                Some(existing) => existing.merge(method),
                None => {
                    self.methods.insert(name, method);
                }
            }
        }
    }

    /// True if the class or any of its methods carries evidence.
    pub fn has_evidence(&self) -> bool {
        !self.evidence.is_empty() || self.methods.values().any(MethodRecord::has_evidence)
    }

    /// Own evidence followed by every method's evidence.
    pub fn all_evidence(&self) -> impl Iterator<Item = &Evidence> {
        self.evidence
            .iter()
            .chain(self.methods.values().flat_map(|m| m.evidence.iter()))
    }

    pub(crate) fn retain_methods_with_evidence(&mut self) {
        self.methods.retain(|_, m| m.has_evidence());
    }

    pub(crate) fn methods_mut(&mut self) -> impl Iterator<Item = &mut MethodRecord> {
        self.methods.values_mut()
    }

    pub(crate) fn set_primary_algorithm(&mut self, algorithm: Option<String>) {
        self.primary_algorithm = algorithm;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeLibraryRecord {
    pub name: String,
    pub path: String,
    /// Algorithm name → matching symbol names, in symbol-table order.
    pub symbols: BTreeMap<String, Vec<String>>,
    /// Constant name → found in a scanned data region.
    pub constants: BTreeMap<String, bool>,
    pub packer: bool,
}

impl NativeLibraryRecord {
    pub fn has_crypto_evidence(&self) -> bool {
        self.symbols.values().any(|s| !s.is_empty()) || self.constants.values().any(|&found| found)
    }
}

/// A library that could not be analyzed. Its packer flag is still computed
/// from the file name since protectors often ship deliberately malformed
/// binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSkipped {
    pub name: String,
    pub path: String,
    pub reason: String,
    pub packer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppIdentity {
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

impl AppIdentity {
    pub fn new(file_name: impl Into<String>, package: Option<String>) -> Self {
        Self {
            file_name: file_name.into(),
            package,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScanCounters {
    pub classes_scanned: usize,
    pub methods_scanned: usize,
    pub libraries_scanned: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Result of analysing one application. Built once by the aggregation
/// step; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppReport {
    identity: AppIdentity,
    classes: Vec<ClassRecord>,
    libraries: Vec<NativeLibraryRecord>,
    skipped_libraries: Vec<AnalysisSkipped>,
    counters: ScanCounters,
}

impl AppReport {
    pub(crate) fn new(
        identity: AppIdentity,
        classes: Vec<ClassRecord>,
        libraries: Vec<NativeLibraryRecord>,
        skipped_libraries: Vec<AnalysisSkipped>,
        counters: ScanCounters,
    ) -> Self {
        Self {
            identity,
            classes,
            libraries,
            skipped_libraries,
            counters,
        }
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    pub fn classes(&self) -> &[ClassRecord] {
        &self.classes
    }

    pub fn class(&self, name: &str) -> Option<&ClassRecord> {
        self.classes.iter().find(|c| c.name() == name)
    }

    pub fn libraries(&self) -> &[NativeLibraryRecord] {
        &self.libraries
    }

    pub fn library(&self, name: &str) -> Option<&NativeLibraryRecord> {
        self.libraries.iter().find(|l| l.name == name)
    }

    pub fn skipped_libraries(&self) -> &[AnalysisSkipped] {
        &self.skipped_libraries
    }

    pub fn counters(&self) -> &ScanCounters {
        &self.counters
    }

    /// File names of every packer/protector library, analyzed or skipped.
    pub fn packers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .libraries
            .iter()
            .filter(|l| l.packer)
            .map(|l| l.name.as_str())
            .chain(
                self.skipped_libraries
                    .iter()
                    .filter(|s| s.packer)
                    .map(|s| s.name.as_str()),
            )
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}
