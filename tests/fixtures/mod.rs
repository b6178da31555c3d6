#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use apk_crypto_detect::RuleSet;
use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Bytes of a constant from the bundled rules.
pub fn bundled_constant(name: &str) -> Vec<u8> {
    let rules = RuleSet::from_bundled().unwrap();
    let bytes = rules
        .registry
        .constants()
        .find(|(_, c)| c.name == name)
        .map(|(_, c)| c.bytes.clone())
        .unwrap_or_else(|| panic!("no bundled constant {name}"));
    bytes
}

/// A small AArch64 ELF object with the given function symbols in `.text`
/// and `rodata` as the contents of `.rodata`.
pub fn elf_library(symbols: &[&str], rodata: &[u8]) -> Vec<u8> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::Aarch64, Endianness::Little);

    let text = obj.section_id(StandardSection::Text);
    for name in symbols {
        let offset = obj.append_section_data(text, &[0xc0, 0x03, 0x5f, 0xd6], 4);
        obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value: offset,
            size: 4,
            kind: SymbolKind::Text,
            scope: SymbolScope::Dynamic,
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
    }

    if !rodata.is_empty() {
        let section = obj.section_id(StandardSection::ReadOnlyData);
        obj.append_section_data(section, rodata, 16);
    }

    obj.write().unwrap()
}

/// Write an application archive named `name` into `dir`.
pub fn write_apk(dir: &Path, name: &str, entries: Vec<(&str, Vec<u8>)>) -> PathBuf {
    let path = dir.join(name);
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    writer
        .start_file("AndroidManifest.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"<manifest/>").unwrap();
    for (entry, data) in entries {
        writer.start_file(entry, SimpleFileOptions::default()).unwrap();
        writer.write_all(&data).unwrap();
    }
    writer.finish().unwrap();
    path
}

/// Write the decompiled-code document next to `apk`.
pub fn write_sidecar(apk: &Path, document: &serde_json::Value) -> PathBuf {
    let path = apk.with_extension("classes.json");
    std::fs::write(&path, serde_json::to_string_pretty(document).unwrap()).unwrap();
    path
}

/// Decompiled code of a typical app: an SM4 utility class whose `encrypt`
/// method embeds the S-box, plus a certificate loader.
pub fn sm4_app_document() -> serde_json::Value {
    let mut code = vec![0x1a, 0x00, 0x01, 0x00];
    code.extend_from_slice(&bundled_constant("sm4_sbox"));
    let certificate = format!("-----BEGIN CERTIFICATE-----{}", "A".repeat(374));

    serde_json::json!({
        "package": "com.example.wallet",
        "classes": [
            {"name": "Lcom/example/wallet/SM4Util;", "methods": [
                {"name": "encrypt", "code": hex::encode(&code)},
                {"name": "nativeInit", "external": true}
            ]},
            {"name": "Lcom/example/wallet/Loader;", "methods": [
                {"name": "loadCert", "code": "0e00"}
            ]},
            {"name": "Lcom/example/wallet/Main;", "methods": [
                {"name": "onCreate", "code": "0e00"}
            ]}
        ],
        "strings": {
            (certificate): [{"class": "Lcom/example/wallet/Loader;", "method": "loadCert"}],
            "AES/CBC/PKCS5Padding": [{"class": "Lcom/example/wallet/Main;", "method": "onCreate"}]
        }
    })
}
