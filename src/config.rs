//! Project configuration loading and path resolution.
//!
//! Supports TRUSTPACK_PROJECT env var override for testing.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::assemble::{CertificateEntry, TrustSource};
use crate::passphrase::Passphrase;
use crate::platform::DEFAULT_PASSWORD;

pub const CONFIG_FILE_NAME: &str = "trustpack.toml";

/// Where the merged store goes unless configured otherwise.
pub const DEFAULT_OUTPUT: &str = "build/truststores/cacerts";

pub const MIN_PASSWORD_LEN: usize = 6;

/// Paths for a project using trustpack.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub project_dir: PathBuf,
    pub config_file: PathBuf,
    pub default_output: PathBuf,
}

impl ProjectPaths {
    /// Build paths from the project directory.
    pub fn from_base(base: PathBuf) -> Self {
        let config_file = base.join(CONFIG_FILE_NAME);
        let default_output = base.join(DEFAULT_OUTPUT);
        Self {
            project_dir: base,
            config_file,
            default_output,
        }
    }

    /// Paths for testing: use a temp dir as base.
    pub fn for_test(base: impl AsRef<Path>) -> Self {
        Self::from_base(base.as_ref().to_path_buf())
    }

    /// Get default project paths (respects TRUSTPACK_PROJECT, else the cwd).
    pub fn default_paths() -> Self {
        let base = if let Ok(dir) = std::env::var("TRUSTPACK_PROJECT") {
            PathBuf::from(dir)
        } else if let Ok(cwd) = std::env::current_dir() {
            cwd
        } else {
            PathBuf::from(".")
        };
        Self::from_base(base)
    }

    /// Resolve `path` against the project directory; absolute paths are kept.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.project_dir.join(path)
    }
}

/// The store an assembly starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BaseConfig {
    /// The JVM's own cacerts.
    Java {
        #[serde(default = "default_password")]
        password: String,
    },
    Empty {
        password: String,
    },
    /// A store file, relative to the project directory.
    File {
        path: PathBuf,
        password: String,
    },
}

fn default_password() -> String {
    DEFAULT_PASSWORD.to_string()
}

impl Default for BaseConfig {
    fn default() -> Self {
        BaseConfig::Java {
            password: default_password(),
        }
    }
}

impl BaseConfig {
    pub fn password(&self) -> &str {
        match self {
            BaseConfig::Java { password }
            | BaseConfig::Empty { password }
            | BaseConfig::File { password, .. } => password,
        }
    }
}

/// trustpack.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_home: Option<PathBuf>,
    #[serde(default)]
    pub base: BaseConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<CertificateEntry>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("password of the {base} base store must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort { base: &'static str },

    #[error("certificate {} has an empty alias", path.display())]
    EmptyAlias { path: PathBuf },
}

/// Everything the assembler needs, with paths resolved.
#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    pub source: TrustSource,
    pub certificates: Vec<CertificateEntry>,
    pub output: PathBuf,
}

impl Config {
    /// Load config from paths (with shared lock when file exists).
    pub fn load(paths: &ProjectPaths) -> Result<Config> {
        Self::load_file(&paths.config_file)
    }

    /// Load config from an explicit file; a missing file yields defaults.
    pub fn load_file(path: &Path) -> Result<Config> {
        if path.is_file() {
            let mut file = fs::OpenOptions::new()
                .read(true)
                .open(path)
                .with_context(|| format!("open {}", path.display()))?;
            fs2::FileExt::lock_shared(&file)?;
            let mut s = String::new();
            file.read_to_string(&mut s)?;
            let cfg: Config =
                toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
            Ok(cfg)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to paths (with exclusive lock). Creates parent dirs if needed.
    pub fn save(&self, paths: &ProjectPaths) -> Result<()> {
        if let Some(p) = paths.config_file.parent() {
            fs::create_dir_all(p)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&paths.config_file)?;
        fs2::FileExt::lock_exclusive(&file)?;
        let s = toml::to_string_pretty(self)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Check passphrase length and aliases. Duplicate aliases are allowed
    /// (the later certificate wins) but logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = match self.base {
            BaseConfig::Java { .. } => "java",
            BaseConfig::Empty { .. } => "empty",
            BaseConfig::File { .. } => "file",
        };
        if self.base.password().chars().count() < MIN_PASSWORD_LEN {
            return Err(ConfigError::PasswordTooShort { base });
        }

        let mut seen = HashSet::new();
        for cert in &self.certificates {
            if cert.alias.trim().is_empty() {
                return Err(ConfigError::EmptyAlias {
                    path: cert.path.clone(),
                });
            }
            if !seen.insert(cert.alias.to_lowercase()) {
                warn!(alias = %cert.alias, path = %cert.path.display(), "duplicate alias; later certificate wins");
            }
        }
        Ok(())
    }

    pub fn output_path(&self, paths: &ProjectPaths) -> PathBuf {
        match &self.output {
            Some(p) => paths.resolve(p),
            None => paths.default_output.clone(),
        }
    }

    /// Validate and turn into an assembly request, resolving relative paths
    /// against the project directory.
    pub fn resolve(&self, paths: &ProjectPaths) -> Result<AssemblyRequest, ConfigError> {
        self.validate()?;
        let passphrase = Passphrase::new(self.base.password());
        let source = match &self.base {
            BaseConfig::Java { .. } => TrustSource::Default { passphrase },
            BaseConfig::Empty { .. } => TrustSource::Empty { passphrase },
            BaseConfig::File { path, .. } => TrustSource::File {
                path: paths.resolve(path),
                passphrase,
            },
        };
        let certificates = self
            .certificates
            .iter()
            .map(|c| CertificateEntry::new(paths.resolve(&c.path), c.alias.clone()))
            .collect();
        Ok(AssemblyRequest {
            source,
            certificates,
            output: self.output_path(paths),
        })
    }
}
