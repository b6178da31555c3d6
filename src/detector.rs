//! Analysis of one application, end to end: archive extraction, the managed
//! and native passes, and aggregation into an [`AppReport`].

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::deadline::{Deadline, DEFAULT_TIMEOUT_SECONDS};
use crate::error::AnalysisError;
use crate::managed::{DecompiledPackage, ManagedAnalysis, ManagedCodeAnalyzer};
use crate::matcher::NameMatcher;
use crate::native::{locate_constants, EmbeddedLibrary, NativeAnalysis, NativeLibraryAnalyzer};
use crate::package::{ApkArchive, DEFAULT_MAX_LIBRARY_SIZE};
use crate::registry::RuleSet;
use crate::report::{AggregationEngine, AnalysisSkipped, AppIdentity, AppReport};
use crate::signature::ByteSignatureScanner;

/// Extension of the decompiled-code sidecar placed next to an archive.
pub const SIDECAR_EXTENSION: &str = "classes.json";

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Per-application budget; `None` disables the deadline.
    pub timeout: Option<Duration>,
    pub native_only: bool,
    pub raw_search: bool,
    pub max_library_size: u64,
    /// Directory holding `<stem>.json` sidecars instead of next to the
    /// archive.
    pub classes_dir: Option<PathBuf>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            native_only: false,
            raw_search: false,
            max_library_size: DEFAULT_MAX_LIBRARY_SIZE,
            classes_dir: None,
        }
    }
}

impl AnalysisOptions {
    fn deadline(&self) -> Deadline {
        match self.timeout {
            Some(budget) => Deadline::new(budget),
            None => Deadline::unlimited(),
        }
    }
}

/// Owns the loaded rules and the matchers built from them. Shared read-only
/// by every unit of a batch.
pub struct Detector {
    rules: RuleSet,
    matcher: NameMatcher,
    scanner: ByteSignatureScanner,
}

impl Detector {
    pub fn new(rules: RuleSet) -> Self {
        let matcher = NameMatcher::new(&rules.registry, rules.exclusions.clone());
        let scanner = ByteSignatureScanner::new(rules.regions.clone());
        Self {
            rules,
            matcher,
            scanner,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn native_analyzer(&self) -> NativeLibraryAnalyzer<'_> {
        NativeLibraryAnalyzer::new(
            &self.rules.registry,
            &self.matcher,
            &self.scanner,
            &self.rules.packers,
        )
    }

    pub fn managed_analyzer(&self) -> ManagedCodeAnalyzer<'_> {
        ManagedCodeAnalyzer::new(&self.rules.registry, &self.matcher)
    }

    /// Location of the decompiled-code sidecar for `app`.
    pub fn sidecar_path(app: &Path, classes_dir: Option<&Path>) -> PathBuf {
        match classes_dir {
            Some(dir) => {
                let stem = app.file_stem().unwrap_or(app.as_os_str());
                dir.join(format!("{}.json", stem.to_string_lossy()))
            }
            None => app.with_extension(SIDECAR_EXTENSION),
        }
    }

    pub fn analyze_app(
        &self,
        path: &Path,
        options: &AnalysisOptions,
    ) -> Result<AppReport, AnalysisError> {
        let deadline = options.deadline();
        info!(app = %path.display(), "analysing application");

        let mut archive = ApkArchive::open(path)?;
        let extracted = archive.native_libraries(options.max_library_size);
        debug!(
            app = %archive.path().display(),
            entries = archive.entry_count(),
            libraries = extracted.libraries.len(),
            rejected = extracted.rejected.len(),
            "native libraries extracted"
        );
        drop(archive);

        let native_analyzer = self.native_analyzer();
        let rejected: Vec<AnalysisSkipped> = extracted
            .rejected
            .iter()
            .map(|entry| {
                warn!(library = %entry.path, reason = %entry.reason, "ignoring library");
                native_analyzer.skipped(&entry.path, entry.reason.clone())
            })
            .collect();

        let package = if options.native_only {
            None
        } else {
            self.load_sidecar(path, options.classes_dir.as_deref())?
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let identity = AppIdentity::new(file_name, package.as_ref().and_then(|p| p.package.clone()));

        let report = self.analyze_inputs(
            identity,
            package.as_ref(),
            &extracted.libraries,
            rejected,
            &deadline,
        )?;

        if options.raw_search {
            for library in &extracted.libraries {
                locate_constants(&self.rules.registry, library);
            }
        }

        Ok(report)
    }

    /// Run both passes over already extracted inputs and aggregate them.
    /// The passes share nothing mutable and run concurrently.
    pub fn analyze_inputs(
        &self,
        identity: AppIdentity,
        package: Option<&DecompiledPackage>,
        libraries: &[EmbeddedLibrary],
        rejected: Vec<AnalysisSkipped>,
        deadline: &Deadline,
    ) -> Result<AppReport, AnalysisError> {
        let managed_analyzer = self.managed_analyzer();
        let native_analyzer = self.native_analyzer();

        let (managed, native) = rayon::join(
            || match package {
                Some(package) => {
                    managed_analyzer.analyze(&package.classes, &package.strings, deadline)
                }
                None => Ok(ManagedAnalysis::default()),
            },
            || native_analyzer.analyze_all(libraries, deadline),
        );
        let managed = managed?;
        let native: NativeAnalysis = native?.with_skipped(rejected);

        let report = AggregationEngine::new(&self.rules.registry).merge(
            identity,
            [managed],
            native,
            deadline.elapsed(),
        );

        debug!(
            app = %report.identity().file_name,
            elapsed_ms = report.counters().elapsed.as_millis() as u64,
            classes = report.classes().len(),
            libraries = report.libraries().len(),
            "application analysed"
        );
        Ok(report)
    }

    fn load_sidecar(
        &self,
        app: &Path,
        classes_dir: Option<&Path>,
    ) -> Result<Option<DecompiledPackage>, AnalysisError> {
        let sidecar = Self::sidecar_path(app, classes_dir);
        if !sidecar.is_file() {
            warn!(
                app = %app.display(),
                sidecar = %sidecar.display(),
                "no decompiled code found, running native analysis only"
            );
            return Ok(None);
        }
        Ok(Some(DecompiledPackage::from_json_file(&sidecar)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_next_to_archive() {
        let path = Detector::sidecar_path(Path::new("/apps/demo.apk"), None);
        assert_eq!(path, PathBuf::from("/apps/demo.classes.json"));
    }

    #[test]
    fn test_sidecar_in_classes_dir() {
        let path = Detector::sidecar_path(Path::new("/apps/demo.apk"), Some(Path::new("/out")));
        assert_eq!(path, PathBuf::from("/out/demo.json"));

        let dotted = Detector::sidecar_path(Path::new("com.example.app.apk"), Some(Path::new("out")));
        assert_eq!(dotted, PathBuf::from("out/com.example.app.json"));
    }

    #[test]
    fn test_missing_archive_is_input_format_error() {
        let detector = Detector::new(RuleSet::from_bundled().unwrap());
        let err = detector
            .analyze_app(Path::new("/nonexistent/app.apk"), &AnalysisOptions::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InputFormat(_)));
    }
}
