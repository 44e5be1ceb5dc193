//! Certificate-store loader: format detection by trial.
//!
//! There is no "detect format" primitive, so each candidate format in
//! [`PROBE_ORDER`] is tried in turn and the first one that opens the file
//! wins. Order is a priority policy and must be preserved.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, error};

use crate::error::{FormatError, TrustStoreError};
use crate::format::{ContainerFormat, ProbeOutcome, StoreFormat, PROBE_ORDER};
use crate::passphrase::Passphrase;
use crate::store::TrustStore;

/// Open `path` as the first format in the default probe order that accepts it.
pub fn probe_and_load(path: &Path, passphrase: &Passphrase) -> Result<TrustStore, TrustStoreError> {
    let candidates: Vec<&dyn ContainerFormat> = PROBE_ORDER.iter().map(|f| f.codec()).collect();
    probe_and_load_with(path, passphrase, &candidates)
}

/// Open `path` trying `candidates` in order.
pub fn probe_and_load_with(
    path: &Path,
    passphrase: &Passphrase,
    candidates: &[&dyn ContainerFormat],
) -> Result<TrustStore, TrustStoreError> {
    let mut last_corruption: Option<(StoreFormat, FormatError)> = None;

    for candidate in candidates {
        let format = candidate.kind();
        debug!(path = %path.display(), %format, "trying to load trust store");

        match try_candidate(path, passphrase, *candidate) {
            Ok(store) => {
                debug!(path = %path.display(), %format, entries = store.len(), "loaded trust store");
                return Ok(store);
            }
            Err(ProbeOutcome::WrongFormat(reason)) => {
                debug!(path = %path.display(), %format, %reason, "trust store is not of this format");
            }
            Err(ProbeOutcome::Corrupt(cause)) => {
                error!(path = %path.display(), %format, error = %cause, "loading trust store failed");
                last_corruption = Some((format, cause));
            }
            Err(ProbeOutcome::Fatal(e)) => return Err(e),
        }
    }

    match last_corruption {
        Some((format, source)) => Err(TrustStoreError::CorruptStore {
            path: path.to_path_buf(),
            format,
            source,
        }),
        None => Err(TrustStoreError::FormatNotRecognized {
            path: path.to_path_buf(),
        }),
    }
}

/// One read handle per candidate; closed when it goes out of scope.
fn try_candidate(
    path: &Path,
    passphrase: &Passphrase,
    candidate: &dyn ContainerFormat,
) -> Result<TrustStore, ProbeOutcome> {
    let mut file = File::open(path).map_err(|source| {
        ProbeOutcome::Fatal(TrustStoreError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        })
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(FormatError::from)?;
    candidate.open(&bytes, passphrase)
}
