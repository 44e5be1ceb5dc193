//! Shared test helpers.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use trustpack::store::TrustedCertificate;
use trustpack::{Passphrase, StoreFormat, TrustStore};

pub const PASSWORD: &str = "s3cret-pass";

/// Create a temp directory for use as a project dir.
pub fn temp_project() -> TempDir {
    tempfile::Builder::new()
        .prefix("trustpack_test_")
        .tempdir()
        .expect("temp dir")
}

/// A generated self-signed certificate written to disk.
pub struct TestCert {
    pub path: PathBuf,
    pub der: Vec<u8>,
}

fn generate(name: &str) -> rcgen::Certificate {
    let key = rcgen::KeyPair::generate().expect("key pair");
    let mut params = rcgen::CertificateParams::new(vec![name.to_string()]).expect("params");
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, rcgen::DnValue::Utf8String(name.to_string()));
    params.self_signed(&key).expect("self-signed cert")
}

/// Write `<name>.pem` into `dir`.
pub fn write_cert(dir: &Path, name: &str) -> TestCert {
    let cert = generate(name);
    let path = dir.join(format!("{name}.pem"));
    fs::write(&path, cert.pem()).unwrap();
    TestCert {
        path,
        der: cert.der().to_vec(),
    }
}

/// Write `<name>.der` into `dir`.
pub fn write_der_cert(dir: &Path, name: &str) -> TestCert {
    let cert = generate(name);
    let path = dir.join(format!("{name}.der"));
    fs::write(&path, cert.der()).unwrap();
    TestCert {
        path,
        der: cert.der().to_vec(),
    }
}

/// PKCS#8 private key and the self-signed certificate it signs, both DER.
pub struct TestKeyPair {
    pub key_der: Vec<u8>,
    pub cert_der: Vec<u8>,
}

pub fn key_pair(name: &str) -> TestKeyPair {
    let key = rcgen::KeyPair::generate().unwrap();
    let cert = rcgen::CertificateParams::new(vec![name.to_string()])
        .unwrap()
        .self_signed(&key)
        .unwrap();
    TestKeyPair {
        key_der: key.serialize_der(),
        cert_der: cert.der().to_vec(),
    }
}

/// Write a certificate whose validity ended in 2001.
pub fn write_expired_cert(dir: &Path, name: &str) -> TestCert {
    let key = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(vec![name.to_string()]).unwrap();
    params.not_before = rcgen::date_time_ymd(2000, 1, 1);
    params.not_after = rcgen::date_time_ymd(2001, 1, 1);
    let cert = params.self_signed(&key).unwrap();
    let path = dir.join(format!("{name}.pem"));
    fs::write(&path, cert.pem()).unwrap();
    TestCert {
        path,
        der: cert.der().to_vec(),
    }
}

/// Write a store of `format` holding `certs` (alias, der) to `dir/file`.
pub fn write_store(
    dir: &Path,
    file: &str,
    format: StoreFormat,
    certs: &[(&str, &[u8])],
    password: &str,
) -> PathBuf {
    let mut store = TrustStore::new(format);
    for (alias, der) in certs {
        store.set_certificate(alias, TrustedCertificate::new(der.to_vec()));
    }
    let path = dir.join(file);
    store.write_to(&path, &Passphrase::new(password)).unwrap();
    path
}

/// Deterministic pseudo-random bytes (xorshift).
pub fn noise(len: usize, mut seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        out.extend_from_slice(&seed.to_le_bytes());
    }
    out.truncate(len);
    out
}
