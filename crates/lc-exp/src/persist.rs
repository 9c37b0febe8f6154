use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use lc_core::errors::LcError;
use lc_core::serde::to_canonical_json_bytes;
use serde::Serialize;

/// Replaces `path` with `bytes` via a synced temporary file and a rename.
///
/// Readers observe either the previous contents or the new contents, never a
/// partially written file.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<(), LcError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| LcError::io("persist-mkdir", parent, err))?;
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()));
    let mut file = File::create(&tmp).map_err(|err| LcError::io("persist-create", &tmp, err))?;
    file.write_all(bytes)
        .map_err(|err| LcError::io("persist-write", &tmp, err))?;
    file.sync_all()
        .map_err(|err| LcError::io("persist-sync", &tmp, err))?;
    fs::rename(&tmp, path).map_err(|err| LcError::io("persist-rename", path, err))?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// Atomically writes `value` as canonical JSON.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), LcError> {
    let bytes = to_canonical_json_bytes(value)?;
    atomic_write_bytes(path, &bytes)
}
