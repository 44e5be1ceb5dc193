//! Store assembler: base store plus extra certificates, persisted as one store.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cert;
use crate::error::TrustStoreError;
use crate::format::{StoreFormat, DEFAULT_FORMAT};
use crate::loader;
use crate::passphrase::Passphrase;
use crate::platform::{DefaultStoreLocator, JavaHomeLocator, DEFAULT_PASSWORD};
use crate::store::{TrustStore, TrustedCertificate};

/// Origin of the trust material an assembly starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustSource {
    /// The platform's built-in CA store.
    Default { passphrase: Passphrase },
    /// A new store with no entries.
    Empty { passphrase: Passphrase },
    /// An existing container of unknown format.
    File { path: PathBuf, passphrase: Passphrase },
}

impl TrustSource {
    pub fn passphrase(&self) -> &Passphrase {
        match self {
            TrustSource::Default { passphrase }
            | TrustSource::Empty { passphrase }
            | TrustSource::File { passphrase, .. } => passphrase,
        }
    }

    /// Platform store protected by the well-known default passphrase.
    fn is_platform_default(&self) -> bool {
        matches!(self, TrustSource::Default { passphrase } if passphrase.expose() == DEFAULT_PASSWORD)
    }
}

/// Request to import the certificate at `path` under `alias`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateEntry {
    pub path: PathBuf,
    pub alias: String,
}

impl CertificateEntry {
    pub fn new(path: impl Into<PathBuf>, alias: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: alias.into(),
        }
    }
}

/// How the final store came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreOrigin {
    /// Platform store reported as-is; nothing was read or written.
    PlatformDefault,
    /// Base file reused verbatim; nothing was parsed or written.
    Reused,
    /// A merged store was written to the output path.
    Assembled,
}

/// The usable store an assembly produced.
#[derive(Debug, Clone)]
pub struct AssembledStore {
    /// Absolute path of the store.
    pub path: PathBuf,
    /// Always the base store's passphrase.
    pub passphrase: Passphrase,
    /// Known only when the store was opened or created.
    pub format: Option<StoreFormat>,
    pub origin: StoreOrigin,
    pub entries: Option<usize>,
}

/// Assemble using `JAVA_HOME` to find the platform store.
pub fn assemble(
    source: &TrustSource,
    certificates: &[CertificateEntry],
    output: &Path,
) -> Result<AssembledStore, TrustStoreError> {
    assemble_with_locator(source, certificates, output, &JavaHomeLocator::from_env())
}

/// Assemble using the provided platform locator.
pub fn assemble_with_locator(
    source: &TrustSource,
    certificates: &[CertificateEntry],
    output: &Path,
    locator: &dyn DefaultStoreLocator,
) -> Result<AssembledStore, TrustStoreError> {
    debug!(
        ?source,
        certificates = ?certificates
            .iter()
            .map(|c| format!("{}:{}", c.alias, c.path.display()))
            .collect::<Vec<_>>(),
        "will try to assemble trust store"
    );

    if source.is_platform_default() && certificates.is_empty() {
        let path = absolute(&locator.locate()?)?;
        info!(path = %path.display(), "using default trust store");
        return Ok(AssembledStore {
            path,
            passphrase: source.passphrase().clone(),
            format: None,
            origin: StoreOrigin::PlatformDefault,
            entries: None,
        });
    }

    let base = match source {
        TrustSource::Default { .. } => Some(locator.locate()?),
        TrustSource::File { path, .. } => Some(path.clone()),
        TrustSource::Empty { .. } => None,
    };

    if certificates.is_empty() {
        if let Some(base) = &base {
            ensure_base_exists(base)?;
            let path = absolute(base)?;
            info!(path = %path.display(), "using custom trust store");
            return Ok(AssembledStore {
                path,
                passphrase: source.passphrase().clone(),
                format: None,
                origin: StoreOrigin::Reused,
                entries: None,
            });
        }
    }

    build(base.as_deref(), source.passphrase(), certificates, output).inspect_err(|e| {
        if matches!(e, TrustStoreError::AssemblyFailed { .. }) {
            error!(error = %e, "could not assemble trust store");
        }
    })
}

fn build(
    base: Option<&Path>,
    passphrase: &Passphrase,
    certificates: &[CertificateEntry],
    output: &Path,
) -> Result<AssembledStore, TrustStoreError> {
    let mut store = match base {
        Some(base) => {
            ensure_base_exists(base)?;
            debug!(path = %base.display(), "importing key store");
            let store = loader::probe_and_load(base, passphrase)?;
            debug!(format = %store.format(), "imported trust store");
            store
        }
        None => TrustStore::new(DEFAULT_FORMAT),
    };

    import_certificates(&mut store, certificates)?;
    persist(&store, output, passphrase)?;

    let path = absolute(output)?;
    info!(path = %path.display(), format = %store.format(), entries = store.len(), "using aggregated custom trust store");
    Ok(AssembledStore {
        path,
        passphrase: passphrase.clone(),
        format: Some(store.format()),
        origin: StoreOrigin::Assembled,
        entries: Some(store.len()),
    })
}

/// Import each certificate in order; a repeated alias replaces the earlier entry.
pub fn import_certificates(
    store: &mut TrustStore,
    certificates: &[CertificateEntry],
) -> Result<(), TrustStoreError> {
    for entry in certificates {
        debug!(path = %entry.path.display(), alias = %entry.alias, "importing certificate");
        let der = cert::load_certificate(&entry.path)?;
        if cert::is_expired(&der).unwrap_or(false) {
            warn!(path = %entry.path.display(), alias = %entry.alias, "certificate has expired");
        }
        if store
            .set_certificate(&entry.alias, TrustedCertificate::new(der))
            .is_some()
        {
            debug!(alias = %entry.alias, "replaced existing entry");
        }
    }
    Ok(())
}

/// Write `store` to `output`, creating missing parent directories.
fn persist(store: &TrustStore, output: &Path, passphrase: &Passphrase) -> Result<(), TrustStoreError> {
    debug!(path = %output.display(), "writing custom trust store");
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            TrustStoreError::assembly(format!("create directory {}", parent.display()), e)
        })?;
    }
    store
        .write_to(output, passphrase)
        .map_err(|e| TrustStoreError::assembly(format!("write {}", output.display()), e))
}

fn ensure_base_exists(path: &Path) -> Result<(), TrustStoreError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TrustStoreError::MissingBaseStore {
            path: path.to_path_buf(),
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, TrustStoreError> {
    std::path::absolute(path)
        .map_err(|e| TrustStoreError::assembly(format!("resolve {}", path.display()), e))
}
