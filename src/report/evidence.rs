use serde::Serialize;

/// A single fact supporting attribution of a code unit to an algorithm.
///
/// The derived ordering sorts by kind first, in attribution precedence
/// order, which keeps evidence sets and reports deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    NameMatch { algorithm: String },
    ConstantMatch { algorithm: String, constant: String },
    StringReference { algorithm: String, value: String },
}

/// Evidence categories in precedence order: an identifier match outranks a
/// constant match, which outranks a string reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    NameMatch,
    ConstantMatch,
    StringReference,
}

impl Evidence {
    pub fn name_match(algorithm: impl Into<String>) -> Self {
        Self::NameMatch {
            algorithm: algorithm.into(),
        }
    }

    pub fn constant_match(algorithm: impl Into<String>, constant: impl Into<String>) -> Self {
        Self::ConstantMatch {
            algorithm: algorithm.into(),
            constant: constant.into(),
        }
    }

    pub fn string_reference(algorithm: impl Into<String>, value: impl Into<String>) -> Self {
        Self::StringReference {
            algorithm: algorithm.into(),
            value: value.into(),
        }
    }

    pub fn algorithm(&self) -> &str {
        match self {
            Self::NameMatch { algorithm }
            | Self::ConstantMatch { algorithm, .. }
            | Self::StringReference { algorithm, .. } => algorithm,
        }
    }

    pub fn kind(&self) -> EvidenceKind {
        match self {
            Self::NameMatch { .. } => EvidenceKind::NameMatch,
            Self::ConstantMatch { .. } => EvidenceKind::ConstantMatch,
            Self::StringReference { .. } => EvidenceKind::StringReference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_precedence_order() {
        assert!(EvidenceKind::NameMatch < EvidenceKind::ConstantMatch);
        assert!(EvidenceKind::ConstantMatch < EvidenceKind::StringReference);
    }

    #[test]
    fn test_algorithm_accessor() {
        assert_eq!(Evidence::name_match("sm4").algorithm(), "sm4");
        assert_eq!(Evidence::constant_match("aes", "aes_sbox").algorithm(), "aes");
        assert_eq!(
            Evidence::string_reference("sm3", "SM3withSM2").kind(),
            EvidenceKind::StringReference
        );
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(Evidence::constant_match("sm4", "sm4_sbox")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "constant_match", "algorithm": "sm4", "constant": "sm4_sbox"})
        );
    }
}
