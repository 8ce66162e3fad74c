pub mod exclusions;
pub mod regions;

pub use exclusions::{ExclusionSet, ExclusionStore};
pub use regions::RegionStore;

use crate::error::FieldscanError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub const REGION_STORE_FILE: &str = "roi_sets.json";
pub const EXCLUSION_STORE_FILE: &str = "exclusions.json";

/// Read a whole store document. A missing file yields the default document.
fn load_document<T: DeserializeOwned + Default>(path: &Path) -> Result<T, FieldscanError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(persistence_error(path, e)),
    };
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&content).map_err(|e| persistence_error(path, e))
}

/// Write a whole store document atomically: the JSON goes to a temp file next
/// to `path` which is then renamed over it.
fn persist_document<T: Serialize>(path: &Path, document: &T) -> Result<(), FieldscanError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| persistence_error(path, e))?;

    let json = serde_json::to_string_pretty(document).map_err(|e| persistence_error(path, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| persistence_error(path, e))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.write_all(b"\n"))
        .and_then(|_| tmp.flush())
        .map_err(|e| persistence_error(path, e))?;
    tmp.persist(path).map_err(|e| persistence_error(path, e.error))?;
    Ok(())
}

fn persistence_error(path: &Path, e: impl std::fmt::Display) -> FieldscanError {
    FieldscanError::Persistence {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
