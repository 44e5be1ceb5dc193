//! Handing the assembled store to in-process and child TLS consumers.
//!
//! The JVM reads `javax.net.ssl.trustStore` and
//! `javax.net.ssl.trustStorePassword` once, when its default SSL context is
//! first built. Publishing after the first TLS connection has no effect on
//! that context. A separate JVM only sees the store through its command line
//! or `JAVA_TOOL_OPTIONS`, see [`command_with`].

use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::assemble::AssembledStore;
use crate::passphrase::Passphrase;

pub const TRUST_STORE_PROPERTY: &str = "javax.net.ssl.trustStore";
pub const TRUST_STORE_PASSWORD_PROPERTY: &str = "javax.net.ssl.trustStorePassword";

/// Environment variables `publish` exports. The JVM does not read these;
/// they are for scripts and child processes launched by trustpack, which
/// inherit them. JVM children get the properties through `command_with`.
pub const TRUST_STORE_ENV: &str = "JAVAX_NET_SSL_TRUSTSTORE";
pub const TRUST_STORE_PASSWORD_ENV: &str = "JAVAX_NET_SSL_TRUSTSTOREPASSWORD";

const JAVA_TOOL_OPTIONS: &str = "JAVA_TOOL_OPTIONS";

static ACTIVE: Mutex<Option<TrustStoreProperties>> = Mutex::new(None);

/// The two values advertising the active trust store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStoreProperties {
    pub trust_store: PathBuf,
    pub password: Passphrase,
}

impl From<&AssembledStore> for TrustStoreProperties {
    fn from(store: &AssembledStore) -> Self {
        Self {
            trust_store: store.path.clone(),
            password: store.passphrase.clone(),
        }
    }
}

/// Serializable view, e.g. for `--emit json`.
#[derive(Debug, Serialize)]
pub struct PropertiesView<'a> {
    #[serde(rename = "javax.net.ssl.trustStore")]
    pub trust_store: String,
    #[serde(rename = "javax.net.ssl.trustStorePassword")]
    pub password: &'a str,
}

impl TrustStoreProperties {
    /// `(name, value)` pairs in property form.
    pub fn pairs(&self) -> [(&'static str, String); 2] {
        [
            (TRUST_STORE_PROPERTY, self.trust_store.display().to_string()),
            (TRUST_STORE_PASSWORD_PROPERTY, self.password.expose().to_string()),
        ]
    }

    /// `-Dname=value` flags for a JVM command line.
    pub fn java_options(&self) -> Vec<String> {
        self.pairs()
            .iter()
            .map(|(name, value)| format!("-D{name}={value}"))
            .collect()
    }

    pub fn view(&self) -> PropertiesView<'_> {
        PropertiesView {
            trust_store: self.trust_store.display().to_string(),
            password: self.password.expose(),
        }
    }
}

/// Make `props` the process-wide active trust store and export it to the
/// environment. The last call wins; nothing is rolled back.
pub fn publish(props: &TrustStoreProperties) {
    debug!(path = %props.trust_store.display(), "publishing trust store properties");
    std::env::set_var(TRUST_STORE_ENV, &props.trust_store);
    std::env::set_var(TRUST_STORE_PASSWORD_ENV, props.password.expose());
    let mut active = ACTIVE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *active = Some(props.clone());
}

/// Properties set by the most recent `publish`, if any.
pub fn active() -> Option<TrustStoreProperties> {
    ACTIVE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Append the properties to the child's `JAVA_TOOL_OPTIONS`, keeping any
/// options already present in this process's environment. Options with
/// whitespace are double-quoted.
pub fn command_with(props: &TrustStoreProperties, cmd: &mut Command) {
    let mut options: Vec<String> = std::env::var(JAVA_TOOL_OPTIONS)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .into_iter()
        .collect();
    options.extend(props.java_options().into_iter().map(|o| {
        if o.contains(char::is_whitespace) {
            format!("\"{o}\"")
        } else {
            o
        }
    }));
    cmd.env(JAVA_TOOL_OPTIONS, options.join(" "));
}
