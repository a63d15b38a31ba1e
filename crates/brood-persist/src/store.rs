//! Synchronous document I/O.
//!
//! Writes go to a temporary sibling file that is renamed into place, so
//! a crash mid-write never leaves a truncated document behind. Loads
//! distinguish "nothing saved yet" (`Ok(None)`) from "saved but
//! unreadable" (`Err`), and [`load_or_discard`] folds the latter into a
//! cold start.

use crate::error::PersistError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Temporary sibling used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` as JSON and atomically replace `path` with it.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// [`PersistError::Json`] if encoding fails, [`PersistError::Io`] for any
/// filesystem failure.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    if let Err(e) = write_then_rename(&tmp, path, &bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(tmp, path)
}

/// Load a JSON document.
///
/// # Errors
///
/// Returns `Ok(None)` if the file does not exist, and an error if it
/// exists but cannot be read or parsed.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Load a JSON document, treating any failure as a cold start.
///
/// An unreadable file is logged and ignored, never fatal.
pub fn load_or_discard<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match load_json(path) {
        Ok(value) => value,
        Err(error) => {
            warn!(path = %path.display(), %error, "discarding unreadable document");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_is_sibling() {
        assert_eq!(
            temp_path(Path::new("/a/b/policy.json")),
            PathBuf::from("/a/b/policy.json.tmp")
        );
    }

    #[test]
    fn missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let v: Option<Vec<u32>> = load_json(&dir.path().join("nope.json")).unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/v.json");
        write_json_atomic(&path, &vec![1u32, 2, 3]).unwrap();
        assert!(!temp_path(&path).exists());
        let v: Vec<u32> = load_json(&path).unwrap().unwrap();
        assert_eq!(v, vec![1, 2, 3]);
    }

    #[test]
    fn overwrite_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.json");
        write_json_atomic(&path, "first").unwrap();
        write_json_atomic(&path, "second").unwrap();
        let v: String = load_json(&path).unwrap().unwrap();
        assert_eq!(v, "second");
    }

    #[test]
    fn corrupt_is_error_then_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(load_json::<Vec<u32>>(&path), Err(PersistError::Json(_))));
        assert_eq!(load_or_discard::<Vec<u32>>(&path), None);
    }

    #[test]
    fn write_into_file_parent_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let err = write_json_atomic(&blocker.join("v.json"), &1u32).unwrap_err();
        assert!(matches!(err, PersistError::Io(_)));
    }
}
