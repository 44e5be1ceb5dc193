//! Platform default trust store discovery.

use std::path::PathBuf;

use crate::error::TrustStoreError;

/// Passphrase the JVM ships its `cacerts` with.
pub const DEFAULT_PASSWORD: &str = "changeit";

/// Locations of `cacerts` relative to a Java home, newest layout first.
const CACERTS_CANDIDATES: [&str; 2] = ["lib/security/cacerts", "jre/lib/security/cacerts"];

/// Trait for finding the host's built-in CA store.
pub trait DefaultStoreLocator: Send + Sync {
    fn locate(&self) -> Result<PathBuf, TrustStoreError>;
}

/// Finds `cacerts` under a Java installation.
#[derive(Debug, Clone)]
pub struct JavaHomeLocator {
    java_home: Option<PathBuf>,
}

impl JavaHomeLocator {
    pub fn new(java_home: Option<PathBuf>) -> Self {
        Self { java_home }
    }

    /// Use `JAVA_HOME` from the environment.
    pub fn from_env() -> Self {
        Self::new(std::env::var_os("JAVA_HOME").map(PathBuf::from))
    }
}

impl DefaultStoreLocator for JavaHomeLocator {
    fn locate(&self) -> Result<PathBuf, TrustStoreError> {
        let home = self.java_home.as_ref().ok_or_else(|| {
            TrustStoreError::DefaultStoreUnavailable(
                "JAVA_HOME is not set and no java_home is configured".to_string(),
            )
        })?;
        CACERTS_CANDIDATES
            .iter()
            .map(|c| home.join(c))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                TrustStoreError::DefaultStoreUnavailable(format!(
                    "no cacerts found under {}",
                    home.display()
                ))
            })
    }
}

/// Locator that always answers with the same path (for tests and overrides).
#[derive(Debug, Clone)]
pub struct FixedLocator {
    path: PathBuf,
}

impl FixedLocator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DefaultStoreLocator for FixedLocator {
    fn locate(&self) -> Result<PathBuf, TrustStoreError> {
        Ok(self.path.clone())
    }
}

/// Get the platform locator.
/// If TRUSTPACK_DEFAULT_STORE is set (e.g. in tests), that path is used as-is.
/// Otherwise `java_home` wins over `JAVA_HOME`.
pub fn default_locator(java_home: Option<PathBuf>) -> Box<dyn DefaultStoreLocator> {
    if let Some(path) = std::env::var_os("TRUSTPACK_DEFAULT_STORE") {
        return Box::new(FixedLocator::new(path));
    }
    match java_home {
        Some(home) => Box::new(JavaHomeLocator::new(Some(home))),
        None => Box::new(JavaHomeLocator::from_env()),
    }
}
