use crate::error::RegistryError;
use std::collections::HashSet;

/// A fixed byte sequence characteristic of an algorithm's implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantSignature {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ConstantSignature {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_hex(name: impl Into<String>, hex_bytes: &str) -> Result<Self, RegistryError> {
        let name = name.into();
        let cleaned: String = hex_bytes.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes =
            hex::decode(&cleaned).map_err(|e| RegistryError::invalid_constant(&name, e.to_string()))?;
        Ok(Self { name, bytes })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Algorithm {
    pub name: String,
    pub aliases: Vec<String>,
    pub constants: Vec<ConstantSignature>,
}

impl Algorithm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            aliases: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into().to_lowercase());
        self
    }

    pub fn with_constant(mut self, constant: ConstantSignature) -> Self {
        self.constants.push(constant);
        self
    }

    /// Lower-case substrings attributed to this algorithm, canonical name first.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn constant(&self, name: &str) -> Option<&ConstantSignature> {
        self.constants.iter().find(|c| c.name == name)
    }
}

/// Known algorithms in their configured priority order.
///
/// Every tie between algorithms, whether two names occur in the same
/// identifier or two algorithms have evidence of the same kind, is broken by
/// the position of the algorithm in this registry: earlier wins.
#[derive(Debug, Clone, Default)]
pub struct AlgorithmRegistry {
    algorithms: Vec<Algorithm>,
}

impl AlgorithmRegistry {
    pub fn new(algorithms: Vec<Algorithm>) -> Result<Self, RegistryError> {
        let mut names = HashSet::new();
        let mut constant_names = HashSet::new();

        for algorithm in &algorithms {
            if algorithm.name.trim().is_empty() {
                return Err(RegistryError::invalid_schema("algorithm with empty name"));
            }
            for pattern in algorithm.patterns() {
                if pattern.trim().is_empty() {
                    return Err(RegistryError::invalid_schema(format!(
                        "algorithm '{}' has an empty alias",
                        algorithm.name
                    )));
                }
                if !names.insert(pattern.to_string()) {
                    return Err(RegistryError::invalid_schema(format!(
                        "name '{pattern}' registered more than once"
                    )));
                }
            }
            for constant in &algorithm.constants {
                if constant.bytes.is_empty() {
                    return Err(RegistryError::invalid_constant(
                        &constant.name,
                        "signature is empty",
                    ));
                }
                if !constant_names.insert(constant.name.clone()) {
                    return Err(RegistryError::invalid_schema(format!(
                        "constant '{}' registered more than once",
                        constant.name
                    )));
                }
            }
        }

        Ok(Self { algorithms })
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    pub fn get(&self, name: &str) -> Option<&Algorithm> {
        self.algorithms.iter().find(|a| a.name == name)
    }

    /// Position in the priority order; lower is stronger.
    pub fn priority(&self, name: &str) -> Option<usize> {
        self.algorithms.iter().position(|a| a.name == name)
    }

    /// Every registered constant paired with its owning algorithm, in
    /// priority order.
    pub fn constants(&self) -> impl Iterator<Item = (&Algorithm, &ConstantSignature)> {
        self.algorithms
            .iter()
            .flat_map(|a| a.constants.iter().map(move |c| (a, c)))
    }

    pub fn constant_count(&self) -> usize {
        self.algorithms.iter().map(|a| a.constants.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }
}
