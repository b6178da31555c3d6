use object::{BinaryFormat, Object, ObjectSection, ObjectSymbol};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, trace};

use crate::error::InputFormatError;
use crate::signature::RegionProvider;

/// Sections and symbol names of one parsed ELF shared library.
///
/// Section bytes borrow from the library buffer, so lookups have no side
/// effects and can be repeated freely.
#[derive(Debug)]
pub struct ElfImage<'data> {
    sections: BTreeMap<String, &'data [u8]>,
    symbols: Vec<String>,
}

impl<'data> ElfImage<'data> {
    pub fn parse(name: &str, data: &'data [u8]) -> Result<Self, InputFormatError> {
        let file = object::File::parse(data)
            .map_err(|e| InputFormatError::bad_binary(name, "ELF", e.to_string()))?;

        if file.format() != BinaryFormat::Elf {
            return Err(InputFormatError::bad_binary(
                name,
                "ELF",
                format!("found {:?}", file.format()),
            ));
        }

        let mut sections = BTreeMap::new();
        for section in file.sections() {
            let Ok(section_name) = section.name() else {
                continue;
            };
            match section.data() {
                Ok(bytes) => {
                    sections.entry(section_name.to_string()).or_insert(bytes);
                }
                Err(e) => {
                    debug!(library = name, section = section_name, error = %e, "unreadable section");
                }
            }
        }

        let mut seen = HashSet::new();
        let mut symbols = Vec::new();
        for symbol in file.symbols().chain(file.dynamic_symbols()) {
            match symbol.name() {
                Ok(symbol_name) if !symbol_name.is_empty() => {
                    if seen.insert(symbol_name) {
                        symbols.push(symbol_name.to_string());
                    }
                }
                _ => {}
            }
        }

        trace!(
            library = name,
            sections = sections.len(),
            symbols = symbols.len(),
            "ELF parsed"
        );
        Ok(Self { sections, symbols })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

impl RegionProvider for ElfImage<'_> {
    fn region(&self, name: &str) -> Option<&[u8]> {
        self.sections.get(name).copied()
    }
}
