/// Last component of an archive entry path, which always uses `/`.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// True for archive entries holding an embedded native library
/// (`lib/<abi>/<name>.so`).
pub fn is_native_library_entry(path: &str) -> bool {
    path.starts_with("lib") && path.ends_with(".so")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_nested() {
        assert_eq!(base_name("lib/arm64-v8a/libfoo.so"), "libfoo.so");
    }

    #[test]
    fn test_base_name_plain() {
        assert_eq!(base_name("libfoo.so"), "libfoo.so");
    }

    #[test]
    fn test_native_library_entry() {
        assert!(is_native_library_entry("lib/armeabi-v7a/libfoo.so"));
        assert!(!is_native_library_entry("assets/libfoo.so"));
        assert!(!is_native_library_entry("lib/armeabi-v7a/libfoo.so.txt"));
        assert!(!is_native_library_entry("lib/armeabi-v7a/"));
        assert!(!is_native_library_entry("classes.dex"));
    }
}
