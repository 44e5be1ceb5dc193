//! Trustpack - assemble a trust store from a base store and extra certificates.

pub mod assemble;
pub mod cert;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod handoff;
pub mod loader;
pub mod passphrase;
pub mod platform;
pub mod store;

pub use assemble::{assemble, assemble_with_locator, AssembledStore, CertificateEntry, StoreOrigin, TrustSource};
pub use error::{FormatError, TrustStoreError};
pub use format::StoreFormat;
pub use loader::probe_and_load;
pub use passphrase::Passphrase;
pub use store::TrustStore;
