//! In-memory trust store shared by all container formats.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;

use time::OffsetDateTime;

use crate::error::FormatError;
use crate::format::StoreFormat;
use crate::passphrase::Passphrase;

/// A certificate trusted without an associated private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCertificate {
    der: Vec<u8>,
    created: OffsetDateTime,
}

impl TrustedCertificate {
    pub fn new(der: Vec<u8>) -> Self {
        Self::with_created(der, OffsetDateTime::now_utc())
    }

    pub fn with_created(der: Vec<u8>, created: OffsetDateTime) -> Self {
        Self { der, created }
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn created(&self) -> OffsetDateTime {
        self.created
    }
}

/// JKS private key entry, kept in its protected form.
#[derive(Debug, Clone)]
pub struct JksKeyEntry {
    pub protected_key: Vec<u8>,
    pub chain: Vec<Vec<u8>>,
    pub created: OffsetDateTime,
}

/// Key material found in a base store. Preserved as-is and only ever
/// written back in the format it was read from.
pub enum KeyMaterial {
    Jks(JksKeyEntry),
    Pkcs12(p12_keystore::PrivateKeyChain),
    /// Symmetric key from a PKCS#12 secret bag.
    Pkcs12Secret(p12_keystore::secret::Secret),
}

impl KeyMaterial {
    pub fn format(&self) -> StoreFormat {
        match self {
            KeyMaterial::Jks(_) => StoreFormat::Jks,
            KeyMaterial::Pkcs12(_) | KeyMaterial::Pkcs12Secret(_) => StoreFormat::Pkcs12,
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial({})", self.format())
    }
}

#[derive(Debug)]
pub enum StoreEntry {
    Trusted(TrustedCertificate),
    Key(KeyMaterial),
}

impl StoreEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreEntry::Trusted(_) => "trustedCertEntry",
            StoreEntry::Key(KeyMaterial::Pkcs12Secret(_)) => "SecretKeyEntry",
            StoreEntry::Key(_) => "PrivateKeyEntry",
        }
    }

    /// Leaf certificate of the entry, if any.
    pub fn certificate_der(&self) -> Option<&[u8]> {
        match self {
            StoreEntry::Trusted(c) => Some(c.der()),
            StoreEntry::Key(KeyMaterial::Jks(k)) => k.chain.first().map(Vec::as_slice),
            StoreEntry::Key(KeyMaterial::Pkcs12(chain)) => {
                chain.chain().first().map(|c| c.as_der())
            }
            StoreEntry::Key(KeyMaterial::Pkcs12Secret(_)) => None,
        }
    }
}

/// Aliases are case-insensitive in the JVM containers.
pub fn normalize_alias(alias: &str) -> String {
    alias.to_lowercase()
}

/// Opened store, typed by exactly one container format.
#[derive(Debug)]
pub struct TrustStore {
    format: StoreFormat,
    entries: BTreeMap<String, StoreEntry>,
}

impl TrustStore {
    /// Empty store of the given format.
    pub fn new(format: StoreFormat) -> Self {
        Self {
            format,
            entries: BTreeMap::new(),
        }
    }

    pub fn format(&self) -> StoreFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a trusted certificate. Returns the entry previously stored under the alias.
    pub fn set_certificate(
        &mut self,
        alias: &str,
        certificate: TrustedCertificate,
    ) -> Option<StoreEntry> {
        self.insert_entry(alias, StoreEntry::Trusted(certificate))
    }

    pub fn insert_entry(&mut self, alias: &str, entry: StoreEntry) -> Option<StoreEntry> {
        self.entries.insert(normalize_alias(alias), entry)
    }

    pub fn entry(&self, alias: &str) -> Option<&StoreEntry> {
        self.entries.get(&normalize_alias(alias))
    }

    pub fn certificate(&self, alias: &str) -> Option<&TrustedCertificate> {
        match self.entry(alias) {
            Some(StoreEntry::Trusted(c)) => Some(c),
            _ => None,
        }
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entries.contains_key(&normalize_alias(alias))
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &StoreEntry)> {
        self.entries.iter().map(|(a, e)| (a.as_str(), e))
    }

    /// Serialize in this store's own format.
    pub fn encode(&self, passphrase: &Passphrase) -> Result<Vec<u8>, FormatError> {
        self.format.codec().encode(self, passphrase)
    }

    /// Serialize and replace `path` atomically: the bytes go to a temp file
    /// in the same directory which is synced and then renamed over the target.
    pub fn write_to(&self, path: &Path, passphrase: &Passphrase) -> Result<(), FormatError> {
        let bytes = self.encode(passphrase)?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
