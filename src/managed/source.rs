//! Decompiled managed code, as handed over by the decompilation step.
//!
//! The decompiler exports one JSON document per application:
//!
//! ```json
//! {
//!   "package": "com.example.app",
//!   "classes": [
//!     {"name": "Lcom/example/SM4Util;", "methods": [
//!       {"name": "encrypt", "code": "1a000100d690e9fe"},
//!       {"name": "nativeInit", "external": true}
//!     ]}
//!   ],
//!   "strings": {
//!     "SM4/ECB/NoPadding": [{"class": "Lcom/example/SM4Util;", "method": "encrypt"}]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::InputFormatError;

/// A (class, method) location that references a string literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub class: String,
    pub method: String,
}

impl MethodRef {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    pub name: String,
    /// Body lives outside the package (external/abstract/native stub).
    pub external: bool,
    pub code: Option<Vec<u8>>,
}

impl MethodHandle {
    pub fn new(name: impl Into<String>, code: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            external: false,
            code: Some(code),
        }
    }

    pub fn external(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external: true,
            code: None,
        }
    }

    /// Code buffer when the body is resolvable.
    pub fn body(&self) -> Option<&[u8]> {
        if self.external {
            None
        } else {
            self.code.as_deref()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHandle {
    pub name: String,
    pub methods: Vec<MethodHandle>,
}

impl ClassHandle {
    pub fn new(name: impl Into<String>, methods: Vec<MethodHandle>) -> Self {
        Self {
            name: name.into(),
            methods,
        }
    }
}

/// Package-wide map from string literal to the methods referencing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringXrefTable {
    entries: BTreeMap<String, BTreeSet<MethodRef>>,
}

impl StringXrefTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: impl Into<String>, location: MethodRef) {
        self.entries.entry(value.into()).or_default().insert(location);
    }

    pub fn references(&self, value: &str) -> Option<&BTreeSet<MethodRef>> {
        self.entries.get(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<MethodRef>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecompiledPackage {
    pub package: Option<String>,
    pub classes: Vec<ClassHandle>,
    pub strings: StringXrefTable,
}

#[derive(Debug, Deserialize)]
struct PackageDocument {
    #[serde(default)]
    package: Option<String>,
    #[serde(default)]
    classes: Vec<ClassEntry>,
    #[serde(default)]
    strings: BTreeMap<String, Vec<MethodRef>>,
}

#[derive(Debug, Deserialize)]
struct ClassEntry {
    name: String,
    #[serde(default)]
    methods: Vec<MethodEntry>,
}

#[derive(Debug, Deserialize)]
struct MethodEntry {
    name: String,
    #[serde(default)]
    external: bool,
    #[serde(default)]
    code: Option<String>,
}

impl DecompiledPackage {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, InputFormatError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| InputFormatError::bad_decompiled_code(path, e.to_string()))?;
        Self::from_json_str(&content, path)
    }

    pub fn from_json_str(content: &str, origin: &Path) -> Result<Self, InputFormatError> {
        let document: PackageDocument = serde_json::from_str(content)
            .map_err(|e| InputFormatError::bad_decompiled_code(origin, e.to_string()))?;

        let mut classes = Vec::with_capacity(document.classes.len());
        for class in document.classes {
            let mut methods = Vec::with_capacity(class.methods.len());
            for method in class.methods {
                let code = match method.code {
                    Some(hex_code) => Some(hex::decode(hex_code.trim()).map_err(|e| {
                        InputFormatError::bad_decompiled_code(
                            origin,
                            format!("{}->{}: {e}", class.name, method.name),
                        )
                    })?),
                    None => None,
                };
                methods.push(MethodHandle {
                    name: method.name,
                    external: method.external,
                    code,
                });
            }
            classes.push(ClassHandle::new(class.name, methods));
        }

        let mut strings = StringXrefTable::new();
        for (value, locations) in document.strings {
            for location in locations {
                strings.insert(value.clone(), location);
            }
        }

        debug!(
            origin = %origin.display(),
            classes = classes.len(),
            strings = strings.len(),
            "decompiled package loaded"
        );

        Ok(Self {
            package: document.package,
            classes,
            strings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document() {
        let json = r#"{
            "package": "com.example",
            "classes": [
                {"name": "SM4Util", "methods": [
                    {"name": "encrypt", "code": "d690e9fe"},
                    {"name": "init", "external": true}
                ]}
            ],
            "strings": {"SM4": [{"class": "SM4Util", "method": "encrypt"}]}
        }"#;

        let package = DecompiledPackage::from_json_str(json, Path::new("t.json")).unwrap();
        assert_eq!(package.package.as_deref(), Some("com.example"));
        let class = &package.classes[0];
        assert_eq!(class.methods[0].body(), Some(&[0xd6, 0x90, 0xe9, 0xfe][..]));
        assert_eq!(class.methods[1].body(), None);
        assert!(package
            .strings
            .references("SM4")
            .unwrap()
            .contains(&MethodRef::new("SM4Util", "encrypt")));
    }

    #[test]
    fn test_external_method_hides_code() {
        let method = MethodHandle {
            name: "stub".into(),
            external: true,
            code: Some(vec![1, 2, 3]),
        };
        assert_eq!(method.body(), None);
    }

    #[test]
    fn test_bad_hex_is_input_format_error() {
        let json = r#"{"classes": [{"name": "A", "methods": [{"name": "m", "code": "xyz"}]}]}"#;
        let err = DecompiledPackage::from_json_str(json, Path::new("t.json")).unwrap_err();
        assert!(err.to_string().contains("A->m"));
    }

    #[test]
    fn test_duplicate_xrefs_collapse() {
        let mut table = StringXrefTable::new();
        table.insert("AES", MethodRef::new("A", "m"));
        table.insert("AES", MethodRef::new("A", "m"));
        assert_eq!(table.references("AES").unwrap().len(), 1);
        assert_eq!(table.len(), 1);
    }
}
