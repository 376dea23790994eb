//! Filesystem helpers shared by the file store, config, and fixture loader.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::{ProspectorError, Result};

/// Maximum file size read into memory (10 MB).
///
/// Lead files and fixtures are small; anything larger is almost certainly
/// not ours.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Read a file into a string, refusing files over [`MAX_FILE_SIZE`].
pub fn read_to_string_limited(path: &Path) -> Result<String> {
    read_to_string_with_limit(path, MAX_FILE_SIZE)
}

/// Read a file into a string, refusing files over `max_size` bytes.
pub fn read_to_string_with_limit(path: &Path, max_size: u64) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| ProspectorError::storage(path, e))?;

    let size = metadata.len();
    if size > max_size {
        return Err(ProspectorError::storage(
            path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file is too large ({} bytes, max {} bytes)", size, max_size),
            ),
        ));
    }

    fs::read_to_string(path).map_err(|e| ProspectorError::storage(path, e))
}

/// Write `contents` to `path` via a hidden temp file in the same directory
/// and a rename, so readers never observe a partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| ProspectorError::storage(dir, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = dir.join(format!(".{}.tmp", file_name));

    {
        let mut file =
            fs::File::create(&temp_path).map_err(|e| ProspectorError::storage(&temp_path, e))?;
        file.write_all(contents)
            .map_err(|e| ProspectorError::storage(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| ProspectorError::storage(&temp_path, e))?;
    }

    // Rename is atomic on POSIX
    fs::rename(&temp_path, path).map_err(|e| ProspectorError::storage(path, e))
}
