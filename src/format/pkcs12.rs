//! PKCS#12 (PFX) container, backed by `p12-keystore`.

use p12_keystore::error::Error as P12Error;
use p12_keystore::{Certificate, KeyStore, KeyStoreEntry};

use super::{check_x509, ContainerFormat, ProbeOutcome, StoreFormat};
use crate::error::FormatError;
use crate::passphrase::Passphrase;
use crate::store::{KeyMaterial, StoreEntry, TrustStore, TrustedCertificate};

pub struct Pkcs12;

impl ContainerFormat for Pkcs12 {
    fn kind(&self) -> StoreFormat {
        StoreFormat::Pkcs12
    }

    fn open(&self, bytes: &[u8], passphrase: &Passphrase) -> Result<TrustStore, ProbeOutcome> {
        if !has_pfx_prefix(bytes) {
            return Err(ProbeOutcome::WrongFormat(
                "missing PFX header (SEQUENCE, version 3)".into(),
            ));
        }

        let keystore = KeyStore::from_pkcs12(bytes, passphrase.expose()).map_err(classify)?;
        let mut store = TrustStore::new(StoreFormat::Pkcs12);
        for (alias, entry) in keystore.entries() {
            let entry = match entry {
                KeyStoreEntry::Certificate(cert) => {
                    check_x509(cert.as_der())?;
                    StoreEntry::Trusted(TrustedCertificate::new(cert.as_der().to_vec()))
                }
                KeyStoreEntry::PrivateKeyChain(chain) => {
                    StoreEntry::Key(KeyMaterial::Pkcs12(chain.clone()))
                }
                KeyStoreEntry::Secret(secret) => {
                    StoreEntry::Key(KeyMaterial::Pkcs12Secret(secret.clone()))
                }
            };
            store.insert_entry(alias, entry);
        }
        Ok(store)
    }

    fn encode(&self, store: &TrustStore, passphrase: &Passphrase) -> Result<Vec<u8>, FormatError> {
        let mut keystore = KeyStore::new();
        for (alias, entry) in store.entries() {
            let entry = match entry {
                StoreEntry::Trusted(cert) => KeyStoreEntry::Certificate(Certificate::from_der(cert.der())?),
                StoreEntry::Key(KeyMaterial::Pkcs12(chain)) => KeyStoreEntry::PrivateKeyChain(chain.clone()),
                StoreEntry::Key(KeyMaterial::Pkcs12Secret(secret)) => KeyStoreEntry::Secret(secret.clone()),
                StoreEntry::Key(_) => {
                    return Err(FormatError::UnsupportedEntry {
                        alias: alias.to_string(),
                        format: StoreFormat::Pkcs12,
                    })
                }
            };
            keystore.add_entry(alias, entry);
        }
        Ok(keystore.writer(passphrase.expose()).write()?)
    }
}

/// A PFX whose algorithms this build cannot handle is left for other
/// candidates; anything else past the header is damage or a wrong passphrase.
fn classify(e: P12Error) -> ProbeOutcome {
    match e {
        P12Error::UnsupportedEncryptionScheme
        | P12Error::UnsupportedMacAlgorithm
        | P12Error::UnsupportedContentType => ProbeOutcome::WrongFormat(e.to_string()),
        other => ProbeOutcome::Corrupt(FormatError::from(other)),
    }
}

/// A PFX is a DER `SEQUENCE` whose first element is `INTEGER 3`.
fn has_pfx_prefix(bytes: &[u8]) -> bool {
    if bytes.first() != Some(&0x30) {
        return false;
    }
    let content_start = match bytes.get(1) {
        Some(&len) if len < 0x80 => 2,
        Some(&len) if (0x81..=0x84).contains(&len) => 2 + usize::from(len & 0x7F),
        _ => return false,
    };
    bytes.get(content_start..content_start + 3) == Some(&[0x02, 0x01, 0x03][..])
}
