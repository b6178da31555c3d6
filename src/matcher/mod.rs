use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::registry::AlgorithmRegistry;

/// Filters applied to literal string constants before name matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Case-sensitive tokens marking certificate material.
    pub certificate_markers: Vec<String>,
    /// Strings longer than this many characters are treated as certificate
    /// or key material.
    pub certificate_length_threshold: usize,
    /// Shortest string considered a base64 blob.
    pub base64_min_length: usize,
    /// Case-insensitive substrings of known benign false positives.
    pub denylist: Vec<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            certificate_markers: vec!["CERTIFICATE".to_string()],
            certificate_length_threshold: 512,
            base64_min_length: 24,
            denylist: vec![
                "#EXTM3U".to_string(),
                "#EXT-X-".to_string(),
                "aesthetic".to_string(),
                "caesar".to_string(),
                "maestro".to_string(),
                "kotlin.jvm.internal".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchContext {
    /// Class, method or symbol names. Never filtered.
    Identifier,
    /// Literal string constants. Subject to [`ExclusionConfig`].
    Freeform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    CertificateMarker,
    TooLong,
    Denylisted,
}

/// Case-insensitive substring matcher over the registry's names.
///
/// Names are tested in registry priority order and the first hit wins, so a
/// value containing both `sm4` and `aes` resolves to whichever of the two is
/// registered first.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    /// (lower-case pattern, canonical name) in priority order.
    patterns: Vec<(String, String)>,
    exclusions: ExclusionConfig,
    denylist_lower: Vec<String>,
}

impl NameMatcher {
    pub fn new(registry: &AlgorithmRegistry, exclusions: ExclusionConfig) -> Self {
        let patterns = registry
            .algorithms()
            .iter()
            .flat_map(|a| a.patterns().map(move |p| (p.to_lowercase(), a.name.clone())))
            .collect();
        let denylist_lower = exclusions.denylist.iter().map(|d| d.to_lowercase()).collect();

        Self {
            patterns,
            exclusions,
            denylist_lower,
        }
    }

    pub fn exclusions(&self) -> &ExclusionConfig {
        &self.exclusions
    }

    /// Canonical algorithm name matched by `value`, if any.
    pub fn match_name(&self, value: &str, context: MatchContext) -> Option<&str> {
        if context == MatchContext::Identifier {
            return self.match_substring(&value.to_lowercase());
        }

        if let Some(reason) = self.exclusion(value) {
            trace!(?reason, len = value.len(), "string excluded from matching");
            return None;
        }

        let lowered = value.to_lowercase();
        if self.looks_like_base64(value) {
            return self.match_token(&lowered);
        }
        self.match_substring(&lowered)
    }

    pub fn exclusion(&self, value: &str) -> Option<Exclusion> {
        if self
            .exclusions
            .certificate_markers
            .iter()
            .any(|m| !m.is_empty() && value.contains(m.as_str()))
        {
            return Some(Exclusion::CertificateMarker);
        }
        if value.chars().count() > self.exclusions.certificate_length_threshold {
            return Some(Exclusion::TooLong);
        }
        let lowered = value.to_lowercase();
        if self
            .denylist_lower
            .iter()
            .any(|d| !d.is_empty() && lowered.contains(d.as_str()))
        {
            return Some(Exclusion::Denylisted);
        }
        None
    }

    /// Padded or unpadded base64 alphabet only, at least
    /// `base64_min_length` characters, with a length a real encoder could
    /// produce.
    pub fn looks_like_base64(&self, value: &str) -> bool {
        if value.len() < self.exclusions.base64_min_length.max(1) {
            return false;
        }
        let body = value.trim_end_matches('=');
        let padding = value.len() - body.len();
        if padding > 2 || body.is_empty() {
            return false;
        }
        if !body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
        {
            return false;
        }
        if padding > 0 {
            value.len() % 4 == 0
        } else {
            body.len() % 4 != 1
        }
    }

    fn match_substring(&self, lowered: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern.as_str()))
            .map(|(_, canonical)| canonical.as_str())
    }

    fn match_token(&self, lowered: &str) -> Option<&str> {
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        self.patterns
            .iter()
            .find(|(pattern, _)| tokens.contains(&pattern.as_str()))
            .map(|(_, canonical)| canonical.as_str())
    }
}
