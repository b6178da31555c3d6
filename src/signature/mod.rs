use memchr::memmem;
use std::collections::BTreeMap;
use tracing::trace;

use crate::registry::AlgorithmRegistry;

/// Source of named byte regions (`.rodata`, `.data`, `.bss`, ...).
///
/// Implementations hand out borrowed slices; looking a region up must not
/// change what a later lookup returns.
pub trait RegionProvider {
    fn region(&self, name: &str) -> Option<&[u8]>;
}

impl RegionProvider for BTreeMap<String, Vec<u8>> {
    fn region(&self, name: &str) -> Option<&[u8]> {
        self.get(name).map(Vec::as_slice)
    }
}

/// Raw substring search for constant signatures.
///
/// Signatures are matched byte for byte: no alignment and no endianness
/// normalization, so each byte order of interest is registered separately.
#[derive(Debug, Clone)]
pub struct ByteSignatureScanner {
    regions: Vec<String>,
}

impl ByteSignatureScanner {
    pub fn new(regions: Vec<String>) -> Self {
        Self { regions }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// True if any configured region of `provider` contains `signature`.
    /// Missing regions count as no match.
    pub fn contains_signature<P: RegionProvider + ?Sized>(
        &self,
        provider: &P,
        signature: &[u8],
    ) -> bool {
        self.regions.iter().any(|name| match provider.region(name) {
            Some(bytes) => Self::contains_in(bytes, signature),
            None => {
                trace!(region = %name, "region absent");
                false
            }
        })
    }

    pub fn contains_in(haystack: &[u8], signature: &[u8]) -> bool {
        !signature.is_empty() && memmem::find(haystack, signature).is_some()
    }

    /// Presence of every registered constant across the configured regions.
    pub fn scan_regions<P: RegionProvider + ?Sized>(
        &self,
        provider: &P,
        registry: &AlgorithmRegistry,
    ) -> BTreeMap<String, bool> {
        registry
            .constants()
            .map(|(_, c)| (c.name.clone(), self.contains_signature(provider, &c.bytes)))
            .collect()
    }

    /// Offset of the first occurrence of `signature` anywhere in `data`.
    ///
    /// Diagnostic only: linear in the size of the whole file and not part of
    /// the per-unit analysis budget.
    pub fn find_offset_in_whole_file(data: &[u8], signature: &[u8]) -> Option<usize> {
        if signature.is_empty() {
            return None;
        }
        memmem::find(data, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Algorithm, ConstantSignature};

    const SIG: &[u8] = &[0xd6, 0x90, 0xe9, 0xfe];

    fn scanner() -> ByteSignatureScanner {
        ByteSignatureScanner::new(vec![
            ".rodata".to_string(),
            ".data".to_string(),
            ".bss".to_string(),
        ])
    }

    fn regions(entries: Vec<(&str, Vec<u8>)>) -> BTreeMap<String, Vec<u8>> {
        entries
            .into_iter()
            .map(|(n, b)| (n.to_string(), b))
            .collect()
    }

    #[test]
    fn test_found_in_any_region() {
        let provider = regions(vec![
            (".rodata", b"nothing".to_vec()),
            (".data", vec![0, 1, 0xd6, 0x90, 0xe9, 0xfe, 7]),
        ]);
        assert!(scanner().contains_signature(&provider, SIG));
    }

    #[test]
    fn test_missing_regions_are_false() {
        let provider = regions(Vec::new());
        assert!(!scanner().contains_signature(&provider, SIG));
    }

    #[test]
    fn test_unconfigured_region_is_ignored() {
        let provider = regions(vec![(".text", SIG.to_vec())]);
        assert!(!scanner().contains_signature(&provider, SIG));
    }

    #[test]
    fn test_no_endianness_normalization() {
        let provider = regions(vec![(".rodata", vec![0xfe, 0xe9, 0x90, 0xd6])]);
        assert!(!scanner().contains_signature(&provider, SIG));
    }

    #[test]
    fn test_repeated_calls_are_stable() {
        let provider = regions(vec![(".rodata", vec![9, 0xd6, 0x90, 0xe9, 0xfe])]);
        let s = scanner();
        assert!(s.contains_signature(&provider, SIG));
        assert!(s.contains_signature(&provider, SIG));
        assert!(!s.contains_signature(&provider, &[1, 2, 3]));
        assert!(s.contains_signature(&provider, SIG));
    }

    #[test]
    fn test_growing_region_never_loses_a_match() {
        let s = scanner();
        let stream = [0u8, 0xd6, 0x90, 0xe9, 0xfe, 3, 4, 0xd6, 0x90, 5];
        let mut seen = false;
        for end in 0..=stream.len() {
            let provider = regions(vec![(".rodata", stream[..end].to_vec())]);
            let found = s.contains_signature(&provider, SIG);
            assert!(found || !seen, "match lost at length {end}");
            seen |= found;
        }
        assert!(seen);
    }

    #[test]
    fn test_empty_signature_never_matches() {
        let provider = regions(vec![(".rodata", b"abc".to_vec())]);
        assert!(!scanner().contains_signature(&provider, &[]));
        assert_eq!(ByteSignatureScanner::find_offset_in_whole_file(b"abc", &[]), None);
    }

    #[test]
    fn test_find_offset_in_whole_file() {
        let data = [1u8, 2, 3, 0xd6, 0x90, 0xe9, 0xfe];
        assert_eq!(ByteSignatureScanner::find_offset_in_whole_file(&data, SIG), Some(3));
        assert_eq!(ByteSignatureScanner::find_offset_in_whole_file(&data, &[4, 4]), None);
    }

    #[test]
    fn test_scan_regions_reports_every_constant() {
        let registry = AlgorithmRegistry::new(vec![
            Algorithm::new("sm4").with_constant(ConstantSignature::new("sm4_sbox", SIG.to_vec())),
            Algorithm::new("aes").with_constant(ConstantSignature::new("aes_sbox", vec![0x63, 0x7c])),
        ])
        .unwrap();
        let provider = regions(vec![(".rodata", SIG.to_vec())]);
        let result = scanner().scan_regions(&provider, &registry);
        assert_eq!(result.get("sm4_sbox"), Some(&true));
        assert_eq!(result.get("aes_sbox"), Some(&false));
    }
}
