use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use zip::ZipArchive;

use crate::error::InputFormatError;
use crate::native::EmbeddedLibrary;
use crate::utils::is_native_library_entry;

/// Default cap on a single embedded library read into memory.
pub const DEFAULT_MAX_LIBRARY_SIZE: u64 = 256 * 1024 * 1024;

/// A native library entry that was found but not extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ExtractedLibraries {
    pub libraries: Vec<EmbeddedLibrary>,
    pub rejected: Vec<RejectedEntry>,
}

/// An application package opened as a zip archive.
///
/// The archive handle lives as long as this value; dropping it closes the
/// file whatever the outcome of the analysis.
pub struct ApkArchive {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl ApkArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, InputFormatError> {
        let path = path.as_ref();
        let file =
            File::open(path).map_err(|e| InputFormatError::bad_archive(path, e.to_string()))?;
        let archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| InputFormatError::bad_archive(path, e.to_string()))?;

        debug!(path = %path.display(), entries = archive.len(), "archive opened");
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> usize {
        self.archive.len()
    }

    /// Read every `lib*.so` entry, in archive order. Entries larger than
    /// `max_size` or that fail to decompress are rejected individually.
    pub fn native_libraries(&mut self, max_size: u64) -> ExtractedLibraries {
        let mut extracted = ExtractedLibraries::default();

        for index in 0..self.archive.len() {
            let name = match self.archive.name_for_index(index) {
                Some(name) if is_native_library_entry(name) => name.to_string(),
                _ => continue,
            };
            // Protectors set the encryption flag on their libraries to stop
            // extraction; those entries are still reported.
            let mut entry = match self.archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    trace!(index, error = %e, "unreadable archive entry");
                    extracted.rejected.push(RejectedEntry {
                        reason: format!("unreadable archive entry: {e}"),
                        path: name,
                    });
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }

            if entry.size() > max_size {
                extracted.rejected.push(RejectedEntry {
                    reason: format!("library size {} exceeds limit of {max_size} bytes", entry.size()),
                    path: name,
                });
                continue;
            }

            let mut data = Vec::with_capacity(entry.size() as usize);
            // Declared sizes can lie; never read past the limit.
            match (&mut entry).take(max_size.saturating_add(1)).read_to_end(&mut data) {
                Ok(read) if read as u64 > max_size => {
                    extracted.rejected.push(RejectedEntry {
                        reason: format!("library exceeds limit of {max_size} bytes"),
                        path: name,
                    });
                }
                Ok(_) => {
                    trace!(library = %name, bytes = data.len(), "library extracted");
                    extracted.libraries.push(EmbeddedLibrary::new(name, data));
                }
                Err(e) => {
                    extracted.rejected.push(RejectedEntry {
                        reason: format!("failed to extract: {e}"),
                        path: name,
                    });
                }
            }
        }

        debug!(
            path = %self.path.display(),
            libraries = extracted.libraries.len(),
            rejected = extracted.rejected.len(),
            "native libraries extracted"
        );
        extracted
    }
}
