use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::batch::{UnitOutcome, UnitStatus};
use crate::registry::AlgorithmRegistry;
use crate::report::{AppReport, Evidence, NativeLibraryRecord};

/// One managed-code match: an (algorithm, class, method) triple. Class-level
/// name matches have no method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedRow {
    pub app: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub algorithm: String,
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Primary algorithm of the class or method the row describes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    pub name_match: bool,
    pub strings: Vec<String>,
    /// Every constant registered for `algorithm` → matched in the code.
    pub constants: BTreeMap<String, bool>,
}

/// One native match: a (library, algorithm) pair, or a bare library row
/// when nothing crypto-related was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeRow {
    pub app: String,
    pub library: String,
    pub path: String,
    pub algorithm: Option<String>,
    pub symbols: Vec<String>,
    pub constants: BTreeMap<String, bool>,
    pub packer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub app: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub status: UnitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub classes_scanned: usize,
    pub methods_scanned: usize,
    pub libraries_scanned: usize,
    pub libraries_skipped: usize,
    pub packers: Vec<String>,
    pub elapsed_ms: u64,
}

struct AlgorithmEvidence<'e> {
    name_match: bool,
    strings: BTreeSet<&'e str>,
    constants: BTreeSet<&'e str>,
}

fn group_by_algorithm<'e, I>(evidence: I) -> BTreeMap<&'e str, AlgorithmEvidence<'e>>
where
    I: IntoIterator<Item = &'e Evidence>,
{
    let mut grouped: BTreeMap<&str, AlgorithmEvidence> = BTreeMap::new();
    for item in evidence {
        let entry = grouped
            .entry(item.algorithm())
            .or_insert_with(|| AlgorithmEvidence {
                name_match: false,
                strings: BTreeSet::new(),
                constants: BTreeSet::new(),
            });
        match item {
            Evidence::NameMatch { .. } => entry.name_match = true,
            Evidence::ConstantMatch { constant, .. } => {
                entry.constants.insert(constant);
            }
            Evidence::StringReference { value, .. } => {
                entry.strings.insert(value);
            }
        }
    }
    grouped
}

fn constant_flags(
    registry: &AlgorithmRegistry,
    algorithm: &str,
    matched: &BTreeSet<&str>,
) -> BTreeMap<String, bool> {
    registry
        .get(algorithm)
        .map(|a| {
            a.constants
                .iter()
                .map(|c| (c.name.clone(), matched.contains(c.name.as_str())))
                .collect()
        })
        .unwrap_or_default()
}

pub fn managed_rows(report: &AppReport, registry: &AlgorithmRegistry) -> Vec<ManagedRow> {
    let app = &report.identity().file_name;
    let package = &report.identity().package;
    let mut rows = Vec::new();

    for class in report.classes() {
        for (algorithm, evidence) in group_by_algorithm(class.evidence()) {
            rows.push(ManagedRow {
                app: app.clone(),
                package: package.clone(),
                algorithm: algorithm.to_string(),
                class: class.name().to_string(),
                method: None,
                primary: class.primary_algorithm().map(str::to_string),
                name_match: evidence.name_match,
                strings: evidence.strings.iter().map(|s| s.to_string()).collect(),
                constants: constant_flags(registry, algorithm, &evidence.constants),
            });
        }

        for method in class.methods() {
            for (algorithm, evidence) in group_by_algorithm(method.evidence()) {
                rows.push(ManagedRow {
                    app: app.clone(),
                    package: package.clone(),
                    algorithm: algorithm.to_string(),
                    class: class.name().to_string(),
                    method: Some(method.name().to_string()),
                    primary: method.primary_algorithm().map(str::to_string),
                    name_match: evidence.name_match,
                    strings: evidence.strings.iter().map(|s| s.to_string()).collect(),
                    constants: constant_flags(registry, algorithm, &evidence.constants),
                });
            }
        }
    }

    rows
}

fn library_rows(
    app: &str,
    library: &NativeLibraryRecord,
    registry: &AlgorithmRegistry,
) -> Vec<NativeRow> {
    let mut rows = Vec::new();

    for algorithm in registry.algorithms() {
        let symbols = library
            .symbols
            .get(&algorithm.name)
            .cloned()
            .unwrap_or_default();
        let constants: BTreeMap<String, bool> = algorithm
            .constants
            .iter()
            .map(|c| {
                let found = library.constants.get(&c.name).copied().unwrap_or(false);
                (c.name.clone(), found)
            })
            .collect();

        if symbols.is_empty() && !constants.values().any(|&found| found) {
            continue;
        }
        rows.push(NativeRow {
            app: app.to_string(),
            library: library.name.clone(),
            path: library.path.clone(),
            algorithm: Some(algorithm.name.clone()),
            symbols,
            constants,
            packer: library.packer,
        });
    }

    if rows.is_empty() {
        rows.push(NativeRow {
            app: app.to_string(),
            library: library.name.clone(),
            path: library.path.clone(),
            algorithm: None,
            symbols: Vec::new(),
            constants: library.constants.clone(),
            packer: library.packer,
        });
    }
    rows
}

pub fn native_rows(report: &AppReport, registry: &AlgorithmRegistry) -> Vec<NativeRow> {
    let app = &report.identity().file_name;
    report
        .libraries()
        .iter()
        .flat_map(|library| library_rows(app, library, registry))
        .collect()
}

impl SummaryRow {
    pub fn from_outcome(outcome: &UnitOutcome) -> Self {
        let app = outcome.app_name();
        match &outcome.report {
            Some(report) => {
                let counters = report.counters();
                Self {
                    app,
                    package: report.identity().package.clone(),
                    status: outcome.status,
                    reason: outcome.reason.clone(),
                    classes_scanned: counters.classes_scanned,
                    methods_scanned: counters.methods_scanned,
                    libraries_scanned: counters.libraries_scanned,
                    libraries_skipped: report.skipped_libraries().len(),
                    packers: report.packers().into_iter().map(str::to_string).collect(),
                    elapsed_ms: outcome.elapsed.as_millis() as u64,
                }
            }
            None => Self {
                app,
                package: None,
                status: outcome.status,
                reason: outcome.reason.clone(),
                classes_scanned: 0,
                methods_scanned: 0,
                libraries_scanned: 0,
                libraries_skipped: 0,
                packers: Vec::new(),
                elapsed_ms: outcome.elapsed.as_millis() as u64,
            },
        }
    }
}
