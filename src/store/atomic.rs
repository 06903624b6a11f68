use crate::core::error::{RateError, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Reads a JSON document, falling back to `T::default()` when the file is
/// missing, unreadable or does not parse.
pub fn read_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Store file missing, using empty default");
            return T::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file unreadable, using empty default");
            return T::default();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file corrupt, using empty default");
            T::default()
        }
    }
}

/// Writes `value` as pretty JSON to a temp file next to `path`, syncs it and
/// renames it over `path`. Readers see either the old or the new document.
pub fn write_atomic<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| RateError::storage(dir, e))?;

    let json = serde_json::to_vec_pretty(value).map_err(|source| RateError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("store");
    let mut temp = tempfile::Builder::new()
        .prefix(&format!("{file_name}.tmp."))
        .tempfile_in(dir)
        .map_err(|e| RateError::storage(dir, e))?;

    // The temp file is removed on drop if any step below fails.
    temp.write_all(&json)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| RateError::storage(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| RateError::storage(path, e.error))?;

    debug!(path = %path.display(), bytes = json.len(), "Store file written");
    Ok(())
}
