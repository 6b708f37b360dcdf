//! Local checkpoint files holding one serialized set each
//!
//! The format is a JSON array, opaque to everything outside this system.
//! Loading is deliberately forgiving: a missing, truncated, or corrupt file
//! yields a fresh empty set so an interrupted first run can start clean.

use crate::checkpoint::CheckpointError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Saves an id set to a checkpoint file, replacing any previous content
pub fn save_ids(path: &Path, ids: &HashSet<u64>) -> Result<(), CheckpointError> {
    save_set(path, ids)
}

/// Loads an id set; a missing or unreadable file is an empty set
pub fn load_ids(path: &Path) -> HashSet<u64> {
    load_set(path)
}

/// Saves a name set to a checkpoint file
pub fn save_names(path: &Path, names: &HashSet<String>) -> Result<(), CheckpointError> {
    save_set(path, names)
}

/// Loads a name set; a missing or unreadable file is an empty set
pub fn load_names(path: &Path) -> HashSet<String> {
    load_set(path)
}

fn save_set<T: Serialize>(path: &Path, set: &T) -> Result<(), CheckpointError> {
    let body = serde_json::to_vec(set).map_err(|source| CheckpointError::Serialize {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::write(path, body).map_err(|source| CheckpointError::Write {
        path: path.display().to_string(),
        source,
    })
}

fn load_set<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(_) => {
            tracing::debug!("No checkpoint at {}, starting with empty set", path.display());
            return T::default();
        }
    };

    match serde_json::from_slice(&content) {
        Ok(set) => {
            tracing::debug!("Checkpoint loaded from {}", path.display());
            set
        }
        Err(_) => {
            tracing::debug!(
                "Checkpoint at {} is empty or corrupt, starting with empty set",
                path.display()
            );
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ids.dat");

        let ids: HashSet<u64> = [1, 42, 7_000_000].into_iter().collect();
        save_ids(&path, &ids).unwrap();

        assert_eq!(load_ids(&path), ids);
    }

    #[test]
    fn test_round_trip_empty_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ids.dat");

        save_ids(&path, &HashSet::new()).unwrap();

        assert!(load_ids(&path).is_empty());
    }

    #[test]
    fn test_load_missing_file_is_empty_set() {
        let dir = tempdir().unwrap();
        assert!(load_ids(&dir.path().join("never_written.dat")).is_empty());
    }

    #[test]
    fn test_load_truncated_file_is_empty_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ids.dat");
        std::fs::write(&path, b"").unwrap();

        assert!(load_ids(&path).is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ids.dat");
        std::fs::write(&path, b"[1, 2, oops").unwrap();

        assert!(load_ids(&path).is_empty());
    }

    #[test]
    fn test_name_set_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("names.dat");

        let names: HashSet<String> =
            ["octo/widget".to_string(), "a/b".to_string()].into_iter().collect();
        save_names(&path, &names).unwrap();

        assert_eq!(load_names(&path), names);
    }
}
