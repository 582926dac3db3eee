use crate::entities::player::{CharacterId, CharacterRecord};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("character {id} encode failed: {source}")]
    Encode {
        id: u32,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("character file {path} invalid: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("character file {path} holds id {found}, expected {expected}")]
    IdMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
}

pub trait CharacterStore: Send + Sync {
    fn save_character(&self, record: &CharacterRecord) -> Result<(), PersistenceError>;
}

/// One YAML file per character under `<root>/characters`. The previous
/// file is kept as `<id>.yaml#` before each overwrite.
#[derive(Debug, Clone)]
pub struct YamlCharacterStore {
    dir: PathBuf,
}

impl YamlCharacterStore {
    pub fn from_root(root: &Path) -> Self {
        Self {
            dir: root.join("characters"),
        }
    }

    pub fn load_character(&self, id: CharacterId) -> Result<Option<CharacterRecord>, PersistenceError> {
        let path = self.character_path(id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Io {
                    action: "read",
                    path,
                    source,
                })
            }
        };
        let record: CharacterRecord =
            serde_yaml::from_str(&text).map_err(|source| PersistenceError::Decode {
                path: path.clone(),
                source,
            })?;
        if record.id != id {
            return Err(PersistenceError::IdMismatch {
                path,
                expected: id.0,
                found: record.id.0,
            });
        }
        Ok(Some(record))
    }

    fn character_path(&self, id: CharacterId) -> PathBuf {
        self.dir.join(format!("{}.yaml", id.0))
    }

    fn backup_path(&self, id: CharacterId) -> PathBuf {
        self.dir.join(format!("{}.yaml#", id.0))
    }
}

impl CharacterStore for YamlCharacterStore {
    fn save_character(&self, record: &CharacterRecord) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            action: "create",
            path: self.dir.clone(),
            source,
        })?;
        let data = serde_yaml::to_string(record).map_err(|source| PersistenceError::Encode {
            id: record.id.0,
            source,
        })?;
        let path = self.character_path(record.id);
        if path.exists() {
            let backup = self.backup_path(record.id);
            fs::copy(&path, &backup).map_err(|source| PersistenceError::Io {
                action: "backup",
                path: backup.clone(),
                source,
            })?;
        }
        fs::write(&path, data).map_err(|source| PersistenceError::Io {
            action: "write",
            path,
            source,
        })
    }
}

/// Keeps the latest save per character in memory.
#[derive(Debug, Default)]
pub struct MemoryCharacterStore {
    saved: Mutex<HashMap<CharacterId, CharacterRecord>>,
    saves: Mutex<usize>,
}

impl MemoryCharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: CharacterId) -> Option<CharacterRecord> {
        self.saved.lock().get(&id).cloned()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl CharacterStore for MemoryCharacterStore {
    fn save_character(&self, record: &CharacterRecord) -> Result<(), PersistenceError> {
        self.saved.lock().insert(record.id, record.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
