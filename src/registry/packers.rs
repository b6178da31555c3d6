use crate::error::RegistryError;
use regex::Regex;
use std::collections::HashSet;

/// Known commercial packer/protector library file names.
#[derive(Debug, Clone, Default)]
pub struct PackerRegistry {
    names: HashSet<String>,
    patterns: Vec<Regex>,
}

impl PackerRegistry {
    pub fn new<N, P>(names: N, patterns: P) -> Result<Self, RegistryError>
    where
        N: IntoIterator<Item = String>,
        P: IntoIterator<Item = String>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(&p).map_err(|e| RegistryError::invalid_packer_pattern(&p, e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            names: names.into_iter().collect(),
            patterns,
        })
    }

    /// Exact match on the base file name, or a match of any versioned-variant
    /// pattern.
    pub fn is_packer(&self, file_name: &str) -> bool {
        self.names.contains(file_name) || self.patterns.iter().any(|p| p.is_match(file_name))
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}
