//! Durable storage for the last delivered fingerprint.

use crate::domain::error::StorageError;
use crate::domain::models::Fingerprint;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Holds exactly one value: the last payload confirmed by the consumer
pub trait FingerprintStore {
    fn load(&self) -> Result<Option<Fingerprint>, StorageError>;

    fn store(&mut self, fingerprint: &Fingerprint) -> Result<(), StorageError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    last_delivered: Fingerprint,
}

/// JSON file store
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl FingerprintStore for JsonFileStore {
    fn load(&self) -> Result<Option<Fingerprint>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: StateFile = serde_json::from_str(&contents)?;
        Ok(Some(state.last_delivered))
    }

    /// Write to a sibling temp file then rename over the old state
    fn store(&mut self, fingerprint: &Fingerprint) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_string(&StateFile {
            last_delivered: fingerprint.clone(),
        })?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        info!("Stored fingerprint {} to {}", fingerprint, self.path.display());
        Ok(())
    }
}
