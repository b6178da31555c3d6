mod algorithm;
mod loader;
mod packers;

pub use algorithm::{Algorithm, AlgorithmRegistry, ConstantSignature};
pub use loader::{default_regions, RuleSet};
pub use packers::PackerRegistry;

pub use crate::error::RegistryError;
