//! Build cache manifest
//!
//! Maps every output path (relative to the output root, `/`-separated) to the
//! fingerprint of the bytes last written there. A rebuild skips writes whose
//! fingerprint is unchanged and removes outputs that disappeared.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::logger;

const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            outputs: BTreeMap::new(),
        }
    }
}

impl Manifest {
    /// Read a manifest. Missing, unreadable or stale-format manifests start
    /// an empty cache; only the last two are worth a warning.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                logger::log_warning(&format!(
                    "Ignoring build cache {}: {e}",
                    path.display()
                ));
                return Self::default();
            }
        };

        match serde_json::from_slice::<Self>(&raw) {
            Ok(manifest) if manifest.version == MANIFEST_VERSION => manifest,
            Ok(manifest) => {
                logger::log_warning(&format!(
                    "Ignoring build cache {} (version {})",
                    path.display(),
                    manifest.version
                ));
                Self::default()
            }
            Err(e) => {
                logger::log_warning(&format!(
                    "Ignoring corrupt build cache {}: {e}",
                    path.display()
                ));
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), BuildError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|source| BuildError::Cache {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|e| BuildError::io(path, e))
    }

    pub fn fingerprint_of(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }
}

/// Content fingerprint stored in the manifest
pub fn fingerprint(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// Manifest key for an output path relative to the output root
pub fn key_for(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
