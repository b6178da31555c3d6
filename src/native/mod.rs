mod image;

pub use image::ElfImage;

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

use crate::deadline::Deadline;
use crate::error::AnalysisError;
use crate::matcher::{MatchContext, NameMatcher};
use crate::registry::{AlgorithmRegistry, PackerRegistry};
use crate::report::{AnalysisSkipped, NativeLibraryRecord};
use crate::signature::ByteSignatureScanner;
use crate::utils::base_name;

/// A native library extracted from an application archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedLibrary {
    /// Path inside the archive, e.g. `lib/arm64-v8a/libfoo.so`.
    pub path: String,
    pub data: Vec<u8>,
}

impl EmbeddedLibrary {
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    pub fn file_name(&self) -> &str {
        base_name(&self.path)
    }
}

/// Output of the native pass over every library of one application.
#[derive(Debug, Clone, Default)]
pub struct NativeAnalysis {
    pub libraries: Vec<NativeLibraryRecord>,
    pub skipped: Vec<AnalysisSkipped>,
    /// Every library examined, skipped ones included.
    pub libraries_scanned: usize,
}

impl NativeAnalysis {
    pub fn with_skipped(mut self, skipped: Vec<AnalysisSkipped>) -> Self {
        self.libraries_scanned += skipped.len();
        self.skipped.extend(skipped);
        self
    }
}

pub struct NativeLibraryAnalyzer<'a> {
    registry: &'a AlgorithmRegistry,
    matcher: &'a NameMatcher,
    scanner: &'a ByteSignatureScanner,
    packers: &'a PackerRegistry,
}

impl<'a> NativeLibraryAnalyzer<'a> {
    pub fn new(
        registry: &'a AlgorithmRegistry,
        matcher: &'a NameMatcher,
        scanner: &'a ByteSignatureScanner,
        packers: &'a PackerRegistry,
    ) -> Self {
        Self {
            registry,
            matcher,
            scanner,
            packers,
        }
    }

    /// Skip record for a library that never reached parsing (oversized,
    /// unreadable archive entry).
    pub fn skipped(&self, path: &str, reason: impl Into<String>) -> AnalysisSkipped {
        let name = base_name(path);
        AnalysisSkipped {
            name: name.to_string(),
            path: path.to_string(),
            reason: reason.into(),
            packer: self.packers.is_packer(name),
        }
    }

    pub fn analyze(&self, library: &EmbeddedLibrary) -> Result<NativeLibraryRecord, AnalysisSkipped> {
        let name = library.file_name();
        let packer = self.packers.is_packer(name);

        let image = ElfImage::parse(name, &library.data).map_err(|e| AnalysisSkipped {
            name: name.to_string(),
            path: library.path.clone(),
            reason: e.to_string(),
            packer,
        })?;

        let mut symbols: BTreeMap<String, Vec<String>> = self
            .registry
            .algorithms()
            .iter()
            .map(|a| (a.name.clone(), Vec::new()))
            .collect();
        for symbol in image.symbols() {
            if let Some(algorithm) = self.matcher.match_name(symbol, MatchContext::Identifier) {
                if let Some(list) = symbols.get_mut(algorithm) {
                    list.push(symbol.clone());
                }
            }
        }

        let constants = self.scanner.scan_regions(&image, self.registry);

        if packer {
            debug!(library = name, "packer library");
        }

        Ok(NativeLibraryRecord {
            name: name.to_string(),
            path: library.path.clone(),
            symbols,
            constants,
            packer,
        })
    }

    /// Analyze each library independently. A library that fails to parse,
    /// or whose analysis fails unexpectedly, is skipped without affecting
    /// the others.
    pub fn analyze_all(
        &self,
        libraries: &[EmbeddedLibrary],
        deadline: &Deadline,
    ) -> Result<NativeAnalysis, AnalysisError> {
        let mut analysis = NativeAnalysis::default();

        for library in libraries {
            deadline.check()?;
            analysis.libraries_scanned += 1;

            match catch_unwind(AssertUnwindSafe(|| self.analyze(library))) {
                Ok(Ok(record)) => analysis.libraries.push(record),
                Ok(Err(skipped)) => {
                    warn!(library = %skipped.path, reason = %skipped.reason, "ignoring library: not an ELF");
                    analysis.skipped.push(skipped);
                }
                Err(_) => {
                    error!(library = %library.path, critical = true, "unexpected failure analysing library");
                    analysis
                        .skipped
                        .push(self.skipped(&library.path, "unexpected analysis failure"));
                }
            }
        }

        debug!(
            libraries = analysis.libraries.len(),
            skipped = analysis.skipped.len(),
            "native libraries analyzed"
        );
        Ok(analysis)
    }
}

/// Whole-file search for every registered constant, ignoring section
/// boundaries. Linear in file size per constant, so it only runs on request
/// and after the budgeted analysis of the unit.
pub fn locate_constants(
    registry: &AlgorithmRegistry,
    library: &EmbeddedLibrary,
) -> BTreeMap<String, usize> {
    let mut offsets = BTreeMap::new();
    for (_, constant) in registry.constants() {
        if let Some(offset) =
            ByteSignatureScanner::find_offset_in_whole_file(&library.data, &constant.bytes)
        {
            debug!(
                library = %library.path,
                constant = %constant.name,
                offset,
                "constant found in file"
            );
            offsets.insert(constant.name.clone(), offset);
        }
    }
    offsets
}
