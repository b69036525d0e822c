//! Per-source checkpoint file.
//!
//! The file is one JSON object mapping source name to the id of the last
//! item that was processed and delivered, e.g. `{"MUSINSA":"4821203"}`.
//! It is read once when the store is opened and rewritten in full on every
//! update through [`AtomicFileWriter`]. One process owns the file at a time.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use snap_core::{ItemId, Source};
use snap_logging::{snap_info, snap_warn, Logger};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("checkpoint file {path} is not a JSON object of strings: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("checkpoint for {source_name} holds an invalid item id {value:?}")]
    InvalidItemId { source_name: String, value: String },
    #[error("failed to encode checkpoints: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to persist checkpoints: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointUpdate {
    Advanced { previous: Option<ItemId> },
    /// The stored id is already equal or newer; nothing was written.
    Unchanged { current: ItemId },
}

#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    entries: BTreeMap<String, ItemId>,
    log: Logger,
}

impl CheckpointStore {
    /// Loads the whole file. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>, log: Logger) -> Result<Self, CheckpointError> {
        let path = path.into();
        let raw: BTreeMap<String, String> = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| CheckpointError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                snap_info!(log, "no checkpoint file at {:?}, starting fresh", path);
                BTreeMap::new()
            }
            Err(source) => {
                return Err(CheckpointError::Read {
                    path: path.clone(),
                    source,
                })
            }
        };

        let mut entries = BTreeMap::new();
        for (source_name, value) in raw {
            let id = ItemId::parse(&value).map_err(|_| CheckpointError::InvalidItemId {
                source_name: source_name.clone(),
                value: value.clone(),
            })?;
            entries.insert(source_name, id);
        }

        Ok(Self { path, entries, log })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, source: &Source) -> Option<ItemId> {
        self.entries.get(source.as_str()).cloned()
    }

    /// Records `item_id` for `source` if it is newer than what is stored,
    /// then rewrites the file. Older or equal ids are ignored.
    pub fn set(
        &mut self,
        source: &Source,
        item_id: ItemId,
    ) -> Result<CheckpointUpdate, CheckpointError> {
        let previous = self.get(source);
        if let Some(current) = previous.as_ref() {
            if !item_id.is_newer_than(current) {
                snap_warn!(
                    self.log,
                    "not moving {} checkpoint from {} to {}",
                    source,
                    current,
                    item_id
                );
                return Ok(CheckpointUpdate::Unchanged {
                    current: current.clone(),
                });
            }
        }

        self.entries.insert(source.as_str().to_string(), item_id.clone());
        if let Err(err) = self.persist() {
            // Keep memory in line with what is on disk.
            match previous.clone() {
                Some(id) => self.entries.insert(source.as_str().to_string(), id),
                None => self.entries.remove(source.as_str()),
            };
            return Err(err);
        }

        snap_info!(self.log, "{} checkpoint saved at {}", source, item_id);
        Ok(CheckpointUpdate::Advanced { previous })
    }

    fn persist(&self) -> Result<(), CheckpointError> {
        let raw: BTreeMap<&str, &str> = self
            .entries
            .iter()
            .map(|(source, id)| (source.as_str(), id.as_str()))
            .collect();
        let content = serde_json::to_vec_pretty(&raw)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = self
            .path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("crawler_state.json"));

        AtomicFileWriter::new(dir).write(&file_name, &content)?;
        Ok(())
    }
}
