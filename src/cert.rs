//! Certificate file parsing and inspection.

use std::fs;
use std::path::Path;

use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{FormatError, TrustStoreError};

/// Read one X.509 certificate from `path` (PEM or DER).
pub fn load_certificate(path: &Path) -> Result<Vec<u8>, TrustStoreError> {
    let bytes = fs::read(path).map_err(|e| {
        TrustStoreError::assembly(format!("read certificate {}", path.display()), e)
    })?;
    parse_certificate(&bytes).map_err(|e| {
        TrustStoreError::assembly(format!("parse certificate {}", path.display()), e)
    })
}

/// First certificate in `bytes`: the leading DER structure of a binary file,
/// else the first `CERTIFICATE` block of a PEM one.
pub fn parse_certificate(bytes: &[u8]) -> Result<Vec<u8>, FormatError> {
    if let Ok((rest, _)) = X509Certificate::from_der(bytes) {
        return Ok(bytes[..bytes.len() - rest.len()].to_vec());
    }

    let der = rustls_pemfile::certs(&mut &bytes[..])
        .next()
        .transpose()
        .map_err(|e| FormatError::MalformedCertificate(e.to_string()))?
        .ok_or_else(|| FormatError::MalformedCertificate("no CERTIFICATE block".into()))?;
    let der = der.as_ref().to_vec();
    crate::format::check_x509(&der)?;
    Ok(der)
}

/// Human-readable view of a certificate for listings.
#[derive(Debug, Clone)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub not_after: String,
    pub expired: bool,
}

pub fn summarize(der: &[u8]) -> Result<CertificateSummary, FormatError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| FormatError::MalformedCertificate(format!("{e:?}")))?;
    let not_after = cert.validity().not_after;
    Ok(CertificateSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_after: not_after.to_string(),
        expired: expired_at(not_after.timestamp())?,
    })
}

/// Check if the certificate's validity has already ended.
pub fn is_expired(der: &[u8]) -> Result<bool, FormatError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| FormatError::MalformedCertificate(format!("{e:?}")))?;
    expired_at(cert.validity().not_after.timestamp())
}

fn expired_at(not_after: i64) -> Result<bool, FormatError> {
    let expiry = time::OffsetDateTime::from_unix_timestamp(not_after)
        .map_err(|e| FormatError::MalformedCertificate(format!("invalid expiry: {e}")))?;
    Ok(expiry < time::OffsetDateTime::now_utc())
}
