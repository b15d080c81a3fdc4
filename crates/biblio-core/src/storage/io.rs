//! Whole-file text I/O for the record files
//!
//! Reads never fail: an absent or unreadable file reads as empty text.
//! Writes replace the whole file through a temp file and a rename, so a
//! reader never sees a partially-written collection.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::warn;

use crate::storage::error::{StorageError, StorageResult};

/// Read a whole file as UTF-8 text
///
/// Returns an empty string if the file is absent or cannot be read. Only
/// failures other than "not found" are logged.
pub fn read_all(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => {
            warn!("{}", StorageError::from_read(e, path.to_path_buf()));
            String::new()
        }
    }
}

/// Replace a file's content with `text`
///
/// 1. Create missing parent directories
/// 2. Write to a temporary file in the same directory and sync it
/// 3. Rename the temp file over the target
///
/// The temp file is removed again if any step after its creation fails.
pub fn write_all(path: &Path, text: &str) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    let result = replace_with_temp(&mut file, &temp_path, path, text);
    if result.is_err() {
        drop(file);
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn replace_with_temp(
    file: &mut File,
    temp_path: &Path,
    path: &Path,
    text: &str,
) -> StorageResult<()> {
    file.write_all(text.as_bytes())
        .map_err(|e| StorageError::from_io(e, temp_path.to_path_buf()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.to_path_buf()))?;

    fs::rename(temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.to_path_buf(),
        to: path.to_path_buf(),
        source,
    })
}
