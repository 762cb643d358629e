//! API credentials
//!
//! A [`Credential`] is an opaque API key. Keys are loaded once from the
//! credential file ([`source`]), optionally probed against the upstream API
//! ([`probe`]), and then circulated between symbol workers by the
//! [`CredentialPool`].

use std::fmt;

pub mod pool;
pub mod probe;
pub mod source;

pub use pool::{CredentialPool, PoolError, PoolSnapshot, SharedPool};
pub use probe::{probe_credentials, ProbeReport, ProbeSettings};
pub use source::load_credentials;

/// Opaque API key
///
/// Not `Clone`. A credential moves into a worker on acquire and back into the
/// pool on release. `Debug` and `Display` only show a masked form.
#[derive(PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for request headers and the failure log only
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form safe for logs: first and last four characters
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}…{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Credential loading errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Credential file could not be read
    #[error("failed to read credentials file {path}: {message}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        message: String,
    },

    /// Credential file is not valid JSON of the expected shape
    #[error("failed to parse credentials file {path}: {message}")]
    Parse {
        /// File path
        path: String,
        /// Underlying error
        message: String,
    },
}
