//! Container formats and the ordered probe list.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, TrustStoreError};
use crate::passphrase::Passphrase;
use crate::store::TrustStore;

pub mod jks;
pub mod pkcs12;

/// Formats tried when probing, highest priority first.
pub const PROBE_ORDER: [StoreFormat; 2] = [StoreFormat::Jks, StoreFormat::Pkcs12];

/// Format used when a store is created from scratch.
pub const DEFAULT_FORMAT: StoreFormat = StoreFormat::Pkcs12;

/// Tag naming a concrete container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    Jks,
    Pkcs12,
}

impl StoreFormat {
    pub fn codec(self) -> &'static dyn ContainerFormat {
        match self {
            StoreFormat::Jks => &jks::Jks,
            StoreFormat::Pkcs12 => &pkcs12::Pkcs12,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StoreFormat::Jks => "jks",
            StoreFormat::Pkcs12 => "pkcs12",
        }
    }
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a candidate format did not open a file.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// Structure/magic does not match this format; try the next one.
    WrongFormat(String),
    /// Right format, bad content (integrity, certificate data, read error).
    Corrupt(FormatError),
    /// Not a probing failure; aborts the probe.
    Fatal(TrustStoreError),
}

impl From<FormatError> for ProbeOutcome {
    fn from(e: FormatError) -> Self {
        ProbeOutcome::Corrupt(e)
    }
}

/// Open/encode capability implemented once per container format.
pub trait ContainerFormat: Send + Sync {
    fn kind(&self) -> StoreFormat;

    /// Decode `bytes` as this format, verifying integrity with `passphrase`.
    fn open(&self, bytes: &[u8], passphrase: &Passphrase) -> Result<TrustStore, ProbeOutcome>;

    /// Encode `store`, protecting it with `passphrase`.
    fn encode(&self, store: &TrustStore, passphrase: &Passphrase) -> Result<Vec<u8>, FormatError>;
}

/// Check that `der` holds an X.509 certificate.
pub(crate) fn check_x509(der: &[u8]) -> Result<(), FormatError> {
    use x509_parser::prelude::FromDer;
    x509_parser::prelude::X509Certificate::from_der(der)
        .map(|_| ())
        .map_err(|e| FormatError::MalformedCertificate(format!("{e:?}")))
}
