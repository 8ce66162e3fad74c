use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{load_document, persist_document};
use crate::error::FieldscanError;
use crate::model::RegionSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegionDocument {
    #[serde(default)]
    sets: Vec<RegionSet>,
}

/// Region sets persisted as one JSON document.
///
/// Every mutation rewrites the whole document; a failed write leaves both the
/// file and the in-memory sets unchanged.
pub struct RegionStore {
    path: PathBuf,
    sets: Mutex<Vec<RegionSet>>,
}

impl RegionStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<RegionStore, FieldscanError> {
        let path = path.into();
        let document: RegionDocument = load_document(&path)?;
        for set in &document.sets {
            set.validate()?;
        }
        Ok(RegionStore {
            path,
            sets: Mutex::new(document.sets),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set names in insertion order.
    pub fn list_sets(&self) -> Vec<String> {
        self.lock().iter().map(|s| s.set_name.clone()).collect()
    }

    pub fn get_set(&self, set_name: &str) -> Option<RegionSet> {
        self.lock().iter().find(|s| s.set_name == set_name).cloned()
    }

    /// Like `get_set`, but a missing set is a configuration error.
    pub fn require_set(&self, set_name: &str) -> Result<RegionSet, FieldscanError> {
        self.get_set(set_name)
            .ok_or_else(|| FieldscanError::UnknownRegionSet(set_name.to_string()))
    }

    /// Insert a new set or replace the set with the same name, keeping its position.
    pub fn upsert_set(&self, set: RegionSet) -> Result<(), FieldscanError> {
        set.validate()?;
        self.modify(|sets| {
            match sets.iter_mut().find(|s| s.set_name == set.set_name) {
                Some(existing) => *existing = set,
                None => sets.push(set),
            }
            true
        })
    }

    /// Returns `false` when no set had that name.
    pub fn delete_set(&self, set_name: &str) -> Result<bool, FieldscanError> {
        let mut removed = false;
        self.modify(|sets| {
            let before = sets.len();
            sets.retain(|s| s.set_name != set_name);
            removed = sets.len() != before;
            removed
        })?;
        Ok(removed)
    }

    /// Merge every set from another region document into this store.
    /// Returns the imported set names.
    pub fn import_sets(&self, source: &Path) -> Result<Vec<String>, FieldscanError> {
        let incoming_sets = read_sets(source)?;
        let names: Vec<String> = incoming_sets.iter().map(|s| s.set_name.clone()).collect();
        self.modify(|sets| {
            for incoming in incoming_sets {
                match sets.iter_mut().find(|s| s.set_name == incoming.set_name) {
                    Some(existing) => *existing = incoming,
                    None => sets.push(incoming),
                }
            }
            true
        })?;
        Ok(names)
    }

    /// Load-modify-persist cycle under the store lock. `change` returns whether
    /// anything changed; unchanged records are not rewritten.
    fn modify<F>(&self, change: F) -> Result<(), FieldscanError>
    where
        F: FnOnce(&mut Vec<RegionSet>) -> bool,
    {
        let mut guard = self.lock();
        let mut next = guard.clone();
        if !change(&mut next) {
            return Ok(());
        }
        persist_document(
            &self.path,
            &RegionDocument {
                sets: next.clone(),
            },
        )?;
        *guard = next;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RegionSet>> {
        // A panic while holding the lock cannot leave a half-applied record:
        // mutations only swap in a fully built copy.
        self.sets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Parse and validate a region document without touching any store.
pub fn read_sets(path: &Path) -> Result<Vec<RegionSet>, FieldscanError> {
    let content = std::fs::read_to_string(path)?;
    let document: RegionDocument = serde_json::from_str(&content)?;
    for set in &document.sets {
        set.validate()?;
    }
    Ok(document.sets)
}
