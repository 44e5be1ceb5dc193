//! Error taxonomy for loading and assembling trust stores.

use std::path::PathBuf;

use thiserror::Error;

use crate::format::StoreFormat;

/// Boxed cause carried by [`TrustStoreError::AssemblyFailed`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the loader and the assembler.
#[derive(Debug, Error)]
pub enum TrustStoreError {
    /// An existing-file source points at a path that is not a file.
    #[error("trust store file does not exist: {}", path.display())]
    MissingBaseStore { path: PathBuf },

    /// No known container format accepted the file.
    #[error("no known container format could load {}", path.display())]
    FormatNotRecognized { path: PathBuf },

    /// A format recognized the file but its content failed verification.
    #[error("trust store {} is corrupt or the passphrase is wrong ({format})", path.display())]
    CorruptStore {
        path: PathBuf,
        format: StoreFormat,
        #[source]
        source: FormatError,
    },

    #[error("cannot open {}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a certificate, parsing it or writing the result failed.
    #[error("could not assemble trust store: {context}")]
    AssemblyFailed {
        context: String,
        #[source]
        source: Cause,
    },

    #[error("platform default trust store unavailable: {0}")]
    DefaultStoreUnavailable(String),
}

impl TrustStoreError {
    pub(crate) fn assembly(context: impl Into<String>, source: impl Into<Cause>) -> Self {
        TrustStoreError::AssemblyFailed {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// Codec-level failures for a single container format.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("store is truncated")]
    Truncated,

    #[error("integrity check failed (wrong passphrase or tampered file)")]
    IntegrityCheckFailed,

    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    #[error("malformed entry: {0}")]
    MalformedEntry(String),

    #[error("entry '{alias}' cannot be stored as {format}")]
    UnsupportedEntry { alias: String, format: StoreFormat },

    #[error("pkcs#12: {0}")]
    Pkcs12(#[from] p12_keystore::error::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
