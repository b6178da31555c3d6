mod fixtures;

use std::time::Duration;

use apk_crypto_detect::report::Evidence;
use apk_crypto_detect::{AnalysisOptions, Detector, RuleSet};
use fixtures::{bundled_constant, elf_library, sm4_app_document, write_apk, write_sidecar};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn detector() -> Detector {
    Detector::new(RuleSet::from_bundled().unwrap())
}

#[test]
fn test_sm4_class_with_sbox_is_attributed() {
    let dir = TempDir::new().unwrap();
    let apk = write_apk(dir.path(), "wallet.apk", Vec::new());
    write_sidecar(&apk, &sm4_app_document());

    let report = detector()
        .analyze_app(&apk, &AnalysisOptions::default())
        .unwrap();

    assert_eq!(report.identity().package.as_deref(), Some("com.example.wallet"));
    let class = report.class("Lcom/example/wallet/SM4Util;").unwrap();
    assert_eq!(class.primary_algorithm(), Some("sm4"));

    let encrypt = class.method("encrypt").unwrap();
    assert!(encrypt
        .evidence()
        .contains(&Evidence::constant_match("sm4", "sm4_sbox")));
    assert_eq!(encrypt.primary_algorithm(), Some("sm4"));
    assert!(class.method("nativeInit").is_none());
}

#[test]
fn test_certificate_string_yields_no_evidence() {
    let dir = TempDir::new().unwrap();
    let apk = write_apk(dir.path(), "wallet.apk", Vec::new());
    write_sidecar(&apk, &sm4_app_document());

    let report = detector()
        .analyze_app(&apk, &AnalysisOptions::default())
        .unwrap();

    assert!(report.class("Lcom/example/wallet/Loader;").is_none());

    let main = report.class("Lcom/example/wallet/Main;").unwrap();
    let on_create = main.method("onCreate").unwrap();
    assert_eq!(on_create.primary_algorithm(), Some("aes"));
    assert!(on_create
        .evidence()
        .contains(&Evidence::string_reference("aes", "AES/CBC/PKCS5Padding")));
}

#[test]
fn test_counters_cover_everything_scanned() {
    let dir = TempDir::new().unwrap();
    let apk = write_apk(
        dir.path(),
        "wallet.apk",
        vec![("lib/arm64-v8a/libplain.so", elf_library(&["main"], b"hello"))],
    );
    write_sidecar(&apk, &sm4_app_document());

    let report = detector()
        .analyze_app(&apk, &AnalysisOptions::default())
        .unwrap();

    let counters = report.counters();
    assert_eq!(counters.classes_scanned, 3);
    assert_eq!(counters.methods_scanned, 4);
    assert_eq!(counters.libraries_scanned, 1);
    assert_eq!(report.classes().len(), 2);
}

#[test]
fn test_packer_library_flagged_without_crypto() {
    let dir = TempDir::new().unwrap();
    let apk = write_apk(
        dir.path(),
        "packed.apk",
        vec![("lib/armeabi-v7a/libjiagu.so", elf_library(&["JNI_OnLoad"], b"plain"))],
    );

    let report = detector()
        .analyze_app(&apk, &AnalysisOptions::default())
        .unwrap();

    let library = report.library("libjiagu.so").unwrap();
    assert!(library.packer);
    assert!(!library.has_crypto_evidence());
    assert_eq!(report.packers(), vec!["libjiagu.so"]);
}

#[test]
fn test_encrypted_packer_library_is_skipped_and_flagged() {
    use std::fs::File;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{AesMode, ZipWriter};

    let dir = TempDir::new().unwrap();
    let apk = dir.path().join("protected.apk");
    let mut writer = ZipWriter::new(File::create(&apk).unwrap());
    writer
        .start_file(
            "lib/arm64-v8a/libjiagu.so",
            SimpleFileOptions::default().with_aes_encryption(AesMode::Aes256, "pw"),
        )
        .unwrap();
    writer
        .write_all(&elf_library(&["JNI_OnLoad"], b"plain"))
        .unwrap();
    writer.finish().unwrap();

    let report = detector()
        .analyze_app(&apk, &AnalysisOptions::default())
        .unwrap();

    assert!(report.libraries().is_empty());
    assert_eq!(report.skipped_libraries().len(), 1);
    assert!(report.skipped_libraries()[0].packer);
    assert_eq!(report.counters().libraries_scanned, 1);
    assert_eq!(report.packers(), vec!["libjiagu.so"]);
}

#[test]
fn test_native_symbols_and_sections() {
    let dir = TempDir::new().unwrap();
    let apk = write_apk(
        dir.path(),
        "native.apk",
        vec![(
            "lib/arm64-v8a/libgmssl.so",
            elf_library(&["SM4_encrypt", "sm3_update", "helper"], &bundled_constant("sm4_sbox")),
        )],
    );

    let report = detector()
        .analyze_app(&apk, &AnalysisOptions::default())
        .unwrap();

    let library = report.library("libgmssl.so").unwrap();
    assert_eq!(library.path, "lib/arm64-v8a/libgmssl.so");
    assert_eq!(library.symbols["sm4"], vec!["SM4_encrypt".to_string()]);
    assert_eq!(library.symbols["sm3"], vec!["sm3_update".to_string()]);
    assert!(library.symbols["aes"].is_empty());
    assert_eq!(library.constants.get("sm4_sbox"), Some(&true));
    assert_eq!(library.constants.get("aes_sbox"), Some(&false));
    assert!(!library.packer);
}

#[test]
fn test_corrupt_library_does_not_affect_the_rest() {
    let dir = TempDir::new().unwrap();
    let apk = write_apk(
        dir.path(),
        "wallet.apk",
        vec![
            ("lib/arm64-v8a/libbroken.so", b"MZ\x90\x00 not an elf".to_vec()),
            (
                "lib/arm64-v8a/libgood.so",
                elf_library(&["aes_encrypt"], &bundled_constant("aes_sbox")),
            ),
        ],
    );
    write_sidecar(&apk, &sm4_app_document());

    let report = detector()
        .analyze_app(&apk, &AnalysisOptions::default())
        .unwrap();

    assert_eq!(report.skipped_libraries().len(), 1);
    assert_eq!(report.skipped_libraries()[0].name, "libbroken.so");
    let good = report.library("libgood.so").unwrap();
    assert_eq!(good.constants.get("aes_sbox"), Some(&true));
    assert!(report.class("Lcom/example/wallet/SM4Util;").is_some());
    assert_eq!(report.counters().libraries_scanned, 2);
}

#[test]
fn test_missing_sidecar_runs_native_only() {
    let dir = TempDir::new().unwrap();
    let apk = write_apk(
        dir.path(),
        "bare.apk",
        vec![("lib/x86/libsm.so", elf_library(&["sm2_sign"], b""))],
    );

    let report = detector()
        .analyze_app(&apk, &AnalysisOptions::default())
        .unwrap();

    assert!(report.classes().is_empty());
    assert_eq!(report.identity().package, None);
    assert_eq!(report.counters().classes_scanned, 0);
    assert_eq!(
        report.library("libsm.so").unwrap().symbols["sm2"],
        vec!["sm2_sign".to_string()]
    );
}

#[test]
fn test_native_only_ignores_sidecar() {
    let dir = TempDir::new().unwrap();
    let apk = write_apk(dir.path(), "wallet.apk", Vec::new());
    write_sidecar(&apk, &sm4_app_document());

    let options = AnalysisOptions {
        native_only: true,
        ..AnalysisOptions::default()
    };
    let report = detector().analyze_app(&apk, &options).unwrap();

    assert!(report.classes().is_empty());
    assert_eq!(report.identity().file_name, "wallet.apk");
}

#[test]
fn test_malformed_sidecar_is_input_format_error() {
    let dir = TempDir::new().unwrap();
    let apk = write_apk(dir.path(), "wallet.apk", Vec::new());
    std::fs::write(apk.with_extension("classes.json"), "{ not json").unwrap();

    let err = detector()
        .analyze_app(&apk, &AnalysisOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        apk_crypto_detect::error::AnalysisError::InputFormat(_)
    ));
}

#[test]
fn test_expired_deadline_times_out() {
    let dir = TempDir::new().unwrap();
    let apk = write_apk(
        dir.path(),
        "slow.apk",
        vec![("lib/x86/libfoo.so", elf_library(&["foo"], b""))],
    );
    write_sidecar(&apk, &sm4_app_document());

    let options = AnalysisOptions {
        timeout: Some(Duration::ZERO),
        ..AnalysisOptions::default()
    };
    let err = detector().analyze_app(&apk, &options).unwrap_err();
    assert!(err.is_timeout());
}
