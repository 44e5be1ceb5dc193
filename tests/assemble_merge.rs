//! Full assembly: base store plus certificates, written to the output path.

mod common;

use std::fs;

use p12_keystore::secret::{Secret, SecretKeyType};
use p12_keystore::{Certificate, KeyStore, KeyStoreEntry, PrivateKeyChain};
use trustpack::loader::probe_and_load;
use trustpack::platform::{FixedLocator, JavaHomeLocator, DEFAULT_PASSWORD};
use trustpack::{
    assemble_with_locator, CertificateEntry, Passphrase, StoreFormat, StoreOrigin, TrustSource,
    TrustStoreError,
};

fn no_platform() -> JavaHomeLocator {
    JavaHomeLocator::new(None)
}

fn empty_source() -> TrustSource {
    TrustSource::Empty {
        passphrase: Passphrase::new(common::PASSWORD),
    }
}

fn file_source(path: &std::path::Path) -> TrustSource {
    TrustSource::File {
        path: path.to_path_buf(),
        passphrase: Passphrase::new(common::PASSWORD),
    }
}

#[test]
fn empty_base_with_two_certificates() {
    let dir = common::temp_project();
    let alice = common::write_cert(dir.path(), "alice.test");
    let bob = common::write_cert(dir.path(), "bob.test");
    let output = dir.path().join("cacerts");

    let result = assemble_with_locator(
        &empty_source(),
        &[
            CertificateEntry::new(&alice.path, "alice"),
            CertificateEntry::new(&bob.path, "bob"),
        ],
        &output,
        &no_platform(),
    )
    .unwrap();

    assert_eq!(result.origin, StoreOrigin::Assembled);
    assert_eq!(result.path, output);
    assert_eq!(result.format, Some(StoreFormat::Pkcs12));
    assert_eq!(result.entries, Some(2));
    assert_eq!(result.passphrase.expose(), common::PASSWORD);

    let store = probe_and_load(&output, &Passphrase::new(common::PASSWORD)).unwrap();
    assert_eq!(store.format(), StoreFormat::Pkcs12);
    assert_eq!(store.len(), 2);
    assert_eq!(store.certificate("alice").unwrap().der(), alice.der.as_slice());
    assert_eq!(store.certificate("bob").unwrap().der(), bob.der.as_slice());
}

#[test]
fn assemble_from_empty_needs_no_platform_store() {
    let dir = common::temp_project();
    let alice = common::write_cert(dir.path(), "alice.test");
    let output = dir.path().join("cacerts");

    let result = trustpack::assemble(
        &empty_source(),
        &[CertificateEntry::new(&alice.path, "alice")],
        &output,
    )
    .unwrap();
    assert_eq!(result.origin, StoreOrigin::Assembled);
    assert_eq!(result.entries, Some(1));
}

#[test]
fn empty_base_without_certificates_writes_empty_store() {
    let dir = common::temp_project();
    let output = dir.path().join("cacerts");

    let result = assemble_with_locator(&empty_source(), &[], &output, &no_platform()).unwrap();
    assert_eq!(result.origin, StoreOrigin::Assembled);
    assert_eq!(result.entries, Some(0));
    assert!(output.is_file());
}

#[test]
fn later_certificate_wins_on_alias_collision() {
    let dir = common::temp_project();
    let first = common::write_cert(dir.path(), "first.test");
    let second = common::write_cert(dir.path(), "second.test");
    let output = dir.path().join("cacerts");

    let result = assemble_with_locator(
        &empty_source(),
        &[
            CertificateEntry::new(&first.path, "same"),
            CertificateEntry::new(&second.path, "same"),
        ],
        &output,
        &no_platform(),
    )
    .unwrap();
    assert_eq!(result.entries, Some(1));

    let store = probe_and_load(&output, &Passphrase::new(common::PASSWORD)).unwrap();
    assert_eq!(store.certificate("same").unwrap().der(), second.der.as_slice());
}

#[test]
fn aliases_are_case_insensitive() {
    let dir = common::temp_project();
    let alice = common::write_cert(dir.path(), "alice.test");
    let output = dir.path().join("cacerts");

    assemble_with_locator(
        &empty_source(),
        &[CertificateEntry::new(&alice.path, "Alice")],
        &output,
        &no_platform(),
    )
    .unwrap();

    let store = probe_and_load(&output, &Passphrase::new(common::PASSWORD)).unwrap();
    assert_eq!(store.aliases().collect::<Vec<_>>(), vec!["alice"]);
    assert!(store.certificate("ALICE").is_some());
}

#[test]
fn output_is_protected_by_base_passphrase() {
    let dir = common::temp_project();
    let alice = common::write_cert(dir.path(), "alice.test");
    let output = dir.path().join("cacerts");

    assemble_with_locator(
        &empty_source(),
        &[CertificateEntry::new(&alice.path, "alice")],
        &output,
        &no_platform(),
    )
    .unwrap();

    let err = probe_and_load(&output, &Passphrase::new("not-the-password")).unwrap_err();
    assert!(matches!(err, TrustStoreError::CorruptStore { .. }));
}

#[test]
fn extending_jks_keeps_format_and_entries() {
    let dir = common::temp_project();
    let existing = common::write_cert(dir.path(), "existing.test");
    let added = common::write_cert(dir.path(), "added.test");
    let base = common::write_store(
        dir.path(),
        "base.jks",
        StoreFormat::Jks,
        &[("existing", &existing.der)],
        common::PASSWORD,
    );
    let before = fs::read(&base).unwrap();
    let output = dir.path().join("out").join("cacerts");

    let result = assemble_with_locator(
        &file_source(&base),
        &[CertificateEntry::new(&added.path, "added")],
        &output,
        &no_platform(),
    )
    .unwrap();
    assert_eq!(result.format, Some(StoreFormat::Jks));
    assert_eq!(result.entries, Some(2));

    let store = probe_and_load(&output, &Passphrase::new(common::PASSWORD)).unwrap();
    assert_eq!(store.format(), StoreFormat::Jks);
    assert_eq!(store.certificate("existing").unwrap().der(), existing.der.as_slice());
    assert_eq!(store.certificate("added").unwrap().der(), added.der.as_slice());
    assert_eq!(fs::read(&base).unwrap(), before);
}

#[test]
fn extending_pkcs12_keeps_format_and_entries() {
    let dir = common::temp_project();
    let existing = common::write_cert(dir.path(), "existing.test");
    let added = common::write_cert(dir.path(), "added.test");
    let base = common::write_store(
        dir.path(),
        "base.p12",
        StoreFormat::Pkcs12,
        &[("existing", &existing.der)],
        common::PASSWORD,
    );
    let output = dir.path().join("cacerts");

    assemble_with_locator(
        &file_source(&base),
        &[CertificateEntry::new(&added.path, "added")],
        &output,
        &no_platform(),
    )
    .unwrap();

    let store = probe_and_load(&output, &Passphrase::new(common::PASSWORD)).unwrap();
    assert_eq!(store.format(), StoreFormat::Pkcs12);
    assert_eq!(store.len(), 2);
    assert!(store.certificate("existing").is_some());
    assert!(store.certificate("added").is_some());
}

#[test]
fn extending_pkcs12_keeps_private_key_entry() {
    let dir = common::temp_project();
    let server = common::key_pair("server.test");
    let chain = PrivateKeyChain::new(
        &server.key_der,
        [0x01u8, 0x02, 0x03, 0x04],
        [Certificate::from_der(&server.cert_der).unwrap()],
    );
    let mut base = KeyStore::new();
    base.add_entry("server", KeyStoreEntry::PrivateKeyChain(chain.clone()));
    let base_path = dir.path().join("base.p12");
    fs::write(&base_path, base.writer(common::PASSWORD).write().unwrap()).unwrap();

    let added = common::write_cert(dir.path(), "added.test");
    let output = dir.path().join("cacerts");
    let result = assemble_with_locator(
        &file_source(&base_path),
        &[CertificateEntry::new(&added.path, "added")],
        &output,
        &no_platform(),
    )
    .unwrap();
    assert_eq!(result.format, Some(StoreFormat::Pkcs12));
    assert_eq!(result.entries, Some(2));

    let written = KeyStore::from_pkcs12(&fs::read(&output).unwrap(), common::PASSWORD).unwrap();
    match written.entry("server") {
        Some(KeyStoreEntry::PrivateKeyChain(kept)) => {
            assert_eq!(kept.key(), chain.key());
            assert_eq!(kept.chain()[0].as_der(), server.cert_der.as_slice());
        }
        other => panic!("expected private key chain, got {other:?}"),
    }
    assert!(matches!(written.entry("added"), Some(KeyStoreEntry::Certificate(_))));
}

#[test]
fn extending_pkcs12_keeps_secret_key_entry() {
    let dir = common::temp_project();
    let secret = Secret::builder(SecretKeyType::AES256Cbc).build().unwrap();
    let mut base = KeyStore::new();
    base.add_entry("mysecret", KeyStoreEntry::Secret(secret.clone()));
    let base_path = dir.path().join("base.p12");
    fs::write(&base_path, base.writer(common::PASSWORD).write().unwrap()).unwrap();

    let added = common::write_cert(dir.path(), "added.test");
    let output = dir.path().join("cacerts");
    let result = assemble_with_locator(
        &file_source(&base_path),
        &[CertificateEntry::new(&added.path, "added")],
        &output,
        &no_platform(),
    )
    .unwrap();
    assert_eq!(result.entries, Some(2));

    let written = KeyStore::from_pkcs12(&fs::read(&output).unwrap(), common::PASSWORD).unwrap();
    match written.entry("mysecret") {
        Some(KeyStoreEntry::Secret(kept)) => {
            assert_eq!(kept.get_key(), secret.get_key());
            assert_eq!(kept.get_key_type(), SecretKeyType::AES256Cbc);
        }
        other => panic!("expected secret key, got {other:?}"),
    }
    assert!(written.entry("added").is_some());
}

#[test]
fn pem_bundle_base_is_not_a_store() {
    let dir = common::temp_project();
    let existing = common::write_cert(dir.path(), "existing.test");
    let added = common::write_cert(dir.path(), "added.test");
    let base = dir.path().join("bundle.pem");
    fs::write(&base, fs::read(&existing.path).unwrap()).unwrap();
    let output = dir.path().join("cacerts");

    let err = assemble_with_locator(
        &file_source(&base),
        &[CertificateEntry::new(&added.path, "added")],
        &output,
        &no_platform(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustStoreError::FormatNotRecognized { .. }));
    assert!(!output.exists());
}

#[test]
fn default_with_certificates_extends_platform_store() {
    let dir = common::temp_project();
    let platform_ca = common::write_cert(dir.path(), "platform.test");
    let cacerts = common::write_store(
        dir.path(),
        "cacerts",
        StoreFormat::Jks,
        &[("platformca", &platform_ca.der)],
        DEFAULT_PASSWORD,
    );
    let corp = common::write_cert(dir.path(), "corp.test");
    let output = dir.path().join("build").join("cacerts");

    let source = TrustSource::Default {
        passphrase: Passphrase::new(DEFAULT_PASSWORD),
    };
    let result = assemble_with_locator(
        &source,
        &[CertificateEntry::new(&corp.path, "corp")],
        &output,
        &FixedLocator::new(&cacerts),
    )
    .unwrap();
    assert_eq!(result.origin, StoreOrigin::Assembled);
    assert_eq!(result.path, output);
    assert_eq!(result.passphrase.expose(), DEFAULT_PASSWORD);

    let store = probe_and_load(&output, &Passphrase::new(DEFAULT_PASSWORD)).unwrap();
    assert_eq!(store.format(), StoreFormat::Jks);
    assert!(store.certificate("platformca").is_some());
    assert!(store.certificate("corp").is_some());
}

#[test]
fn missing_parent_directories_are_created() {
    let dir = common::temp_project();
    let alice = common::write_cert(dir.path(), "alice.test");
    let output = dir.path().join("a").join("b").join("c").join("cacerts");

    assemble_with_locator(
        &empty_source(),
        &[CertificateEntry::new(&alice.path, "alice")],
        &output,
        &no_platform(),
    )
    .unwrap();
    assert!(output.is_file());
}

#[test]
fn rerun_overwrites_previous_output() {
    let dir = common::temp_project();
    let alice = common::write_cert(dir.path(), "alice.test");
    let bob = common::write_cert(dir.path(), "bob.test");
    let output = dir.path().join("cacerts");
    fs::write(&output, b"stale").unwrap();

    assemble_with_locator(
        &empty_source(),
        &[CertificateEntry::new(&alice.path, "alice")],
        &output,
        &no_platform(),
    )
    .unwrap();
    assemble_with_locator(
        &empty_source(),
        &[CertificateEntry::new(&bob.path, "bob")],
        &output,
        &no_platform(),
    )
    .unwrap();

    let store = probe_and_load(&output, &Passphrase::new(common::PASSWORD)).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.certificate("bob").is_some());
}

#[test]
fn der_certificate_file_is_imported() {
    let dir = common::temp_project();
    let cert = common::write_der_cert(dir.path(), "binary.test");
    let output = dir.path().join("cacerts");

    assemble_with_locator(
        &empty_source(),
        &[CertificateEntry::new(&cert.path, "binary")],
        &output,
        &no_platform(),
    )
    .unwrap();

    let store = probe_and_load(&output, &Passphrase::new(common::PASSWORD)).unwrap();
    assert_eq!(store.certificate("binary").unwrap().der(), cert.der.as_slice());
}

#[test]
fn expired_certificate_is_still_imported() {
    let dir = common::temp_project();
    let cert = common::write_expired_cert(dir.path(), "old.test");
    let output = dir.path().join("cacerts");

    let result = assemble_with_locator(
        &empty_source(),
        &[CertificateEntry::new(&cert.path, "old")],
        &output,
        &no_platform(),
    )
    .unwrap();
    assert_eq!(result.entries, Some(1));
}

#[test]
fn unparsable_certificate_fails_assembly() {
    let dir = common::temp_project();
    let bad = dir.path().join("bad.pem");
    fs::write(&bad, "not a certificate").unwrap();
    let output = dir.path().join("cacerts");

    let err = assemble_with_locator(
        &empty_source(),
        &[CertificateEntry::new(&bad, "bad")],
        &output,
        &no_platform(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustStoreError::AssemblyFailed { .. }));
    assert!(err.to_string().contains("bad.pem"));
    assert!(!output.exists());
}

#[test]
fn missing_certificate_file_fails_assembly() {
    let dir = common::temp_project();
    let output = dir.path().join("cacerts");

    let err = assemble_with_locator(
        &empty_source(),
        &[CertificateEntry::new(dir.path().join("gone.pem"), "gone")],
        &output,
        &no_platform(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustStoreError::AssemblyFailed { .. }));
    assert!(!output.exists());
}

#[test]
fn corrupt_base_is_reported() {
    let dir = common::temp_project();
    let existing = common::write_cert(dir.path(), "existing.test");
    let base = common::write_store(
        dir.path(),
        "base.jks",
        StoreFormat::Jks,
        &[("existing", &existing.der)],
        "other-password",
    );
    let added = common::write_cert(dir.path(), "added.test");

    let err = assemble_with_locator(
        &file_source(&base),
        &[CertificateEntry::new(&added.path, "added")],
        &dir.path().join("cacerts"),
        &no_platform(),
    )
    .unwrap_err();
    match err {
        TrustStoreError::CorruptStore { path, format, .. } => {
            assert_eq!(path, base);
            assert_eq!(format, StoreFormat::Jks);
        }
        other => panic!("expected CorruptStore, got {other:?}"),
    }
}

#[test]
fn unrecognized_base_is_reported() {
    let dir = common::temp_project();
    let base = dir.path().join("base.bin");
    fs::write(&base, common::noise(512, 7)).unwrap();
    let added = common::write_cert(dir.path(), "added.test");

    let err = assemble_with_locator(
        &file_source(&base),
        &[CertificateEntry::new(&added.path, "added")],
        &dir.path().join("cacerts"),
        &no_platform(),
    )
    .unwrap_err();
    assert!(matches!(err, TrustStoreError::FormatNotRecognized { .. }));
}
