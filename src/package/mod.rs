//! Application archive access: opening the package and pulling out its
//! embedded native libraries.

mod archive;

pub use archive::{ApkArchive, ExtractedLibraries, RejectedEntry, DEFAULT_MAX_LIBRARY_SIZE};
