use super::{Algorithm, AlgorithmRegistry, ConstantSignature, PackerRegistry};
use crate::error::RegistryError;
use crate::matcher::ExclusionConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

const BUNDLED_RULES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/rules/registry.json"));

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[allow(dead_code)]
    #[serde(default)]
    version: Option<String>,
    algorithms: Option<Vec<AlgorithmEntry>>,
    exclusions: Option<ExclusionConfig>,
    regions: Option<Vec<String>>,
    packers: Option<PackerEntry>,
}

#[derive(Debug, Deserialize)]
struct AlgorithmEntry {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    constants: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PackerEntry {
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
}

/// Everything the analyzers are configured with: the algorithm registry,
/// free-form string exclusions, the scanned data regions and the packer
/// registry.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub registry: AlgorithmRegistry,
    pub exclusions: ExclusionConfig,
    pub regions: Vec<String>,
    pub packers: PackerRegistry,
}

impl RuleSet {
    pub fn from_bundled() -> Result<Self, RegistryError> {
        debug!("loading bundled rules");
        let file: RulesFile = serde_json::from_str(BUNDLED_RULES)
            .map_err(|e| RegistryError::rules_parse_error("<bundled>", e.to_string()))?;

        let registry = build_registry(
            file.algorithms
                .ok_or_else(|| RegistryError::invalid_schema("bundled rules lack algorithms"))?,
        )?;
        let packers = match file.packers {
            Some(entry) => PackerRegistry::new(entry.names, entry.patterns)?,
            None => PackerRegistry::default(),
        };

        let rules = Self {
            registry,
            exclusions: file.exclusions.unwrap_or_default(),
            regions: file.regions.unwrap_or_else(default_regions),
            packers,
        };
        debug!(
            algorithms = rules.registry.len(),
            constants = rules.registry.constant_count(),
            packers = rules.packers.name_count(),
            packer_patterns = rules.packers.pattern_count(),
            "bundled rules loaded"
        );
        Ok(rules)
    }

    /// Bundled rules with the parts present in `path` replacing their
    /// bundled counterparts.
    pub fn from_bundled_with_user_rules<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let mut rules = Self::from_bundled()?;
        rules.load_user_rules(path)?;
        Ok(rules)
    }

    pub fn load_user_rules<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RegistryError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading user rules");

        let content = fs::read_to_string(path)
            .map_err(|e| RegistryError::rules_file_read_error(path, e.to_string()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file: RulesFile = match extension {
            "json" => serde_json::from_str(&content)
                .map_err(|e| RegistryError::rules_parse_error(path, e.to_string()))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| RegistryError::rules_parse_error(path, e.to_string()))?,
            _ => return Err(RegistryError::unsupported_format(extension)),
        };

        self.merge(file)
    }

    fn merge(&mut self, file: RulesFile) -> Result<(), RegistryError> {
        if let Some(algorithms) = file.algorithms {
            self.registry = build_registry(algorithms)?;
            trace!(algorithms = self.registry.len(), "algorithms replaced");
        }
        if let Some(exclusions) = file.exclusions {
            self.exclusions = exclusions;
        }
        if let Some(regions) = file.regions {
            self.regions = regions;
        }
        if let Some(packers) = file.packers {
            self.packers = PackerRegistry::new(packers.names, packers.patterns)?;
        }
        Ok(())
    }
}

fn build_registry(entries: Vec<AlgorithmEntry>) -> Result<AlgorithmRegistry, RegistryError> {
    let algorithms = entries
        .into_iter()
        .map(|entry| {
            let mut algorithm = Algorithm::new(entry.name);
            for alias in entry.aliases {
                algorithm = algorithm.with_alias(alias);
            }
            for (name, hex_bytes) in entry.constants {
                algorithm = algorithm.with_constant(ConstantSignature::from_hex(name, &hex_bytes)?);
            }
            Ok(algorithm)
        })
        .collect::<Result<Vec<_>, RegistryError>>()?;

    AlgorithmRegistry::new(algorithms)
}

pub fn default_regions() -> Vec<String> {
    vec![".rodata".to_string(), ".data".to_string(), ".bss".to_string()]
}
