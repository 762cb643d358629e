//! Credential file loading
//!
//! The credential file is a JSON document of the form `{"keys": ["k1", "k2"]}`.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use super::{Credential, CredentialError};

#[derive(Debug, Deserialize)]
struct CredentialFile {
    keys: Vec<String>,
}

/// Load candidate credentials from a JSON file
///
/// Keys are trimmed; blank and duplicate keys are dropped with a warning.
/// Order of first appearance is preserved.
pub fn load_credentials(path: impl AsRef<Path>) -> Result<Vec<Credential>, CredentialError> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    let contents = std::fs::read_to_string(path).map_err(|e| CredentialError::Io {
        path: shown.clone(),
        message: e.to_string(),
    })?;

    let file: CredentialFile =
        serde_json::from_str(&contents).map_err(|e| CredentialError::Parse {
            path: shown.clone(),
            message: e.to_string(),
        })?;

    let mut seen = HashSet::new();
    let mut credentials = Vec::with_capacity(file.keys.len());

    for (index, raw) in file.keys.into_iter().enumerate() {
        let key = raw.trim();
        if key.is_empty() {
            warn!(path = %shown, index, "Skipping blank credential");
            continue;
        }
        if !seen.insert(key.to_string()) {
            warn!(path = %shown, index, "Skipping duplicate credential");
            continue;
        }
        credentials.push(Credential::new(key));
    }

    info!(path = %shown, credentials = credentials.len(), "Loaded credentials");
    Ok(credentials)
}
