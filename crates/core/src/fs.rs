//! Atomic file writes
//!
//! Every file the engine produces goes through [`write_atomic`]: the content
//! is written to a temporary file next to the target and renamed over it.
//! If anything fails after the temporary file exists, it is removed and the
//! target is left untouched.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::{EngineError, EngineResult};

/// Create `dir` and its parents if missing.
pub fn ensure_dir(dir: &Path) -> EngineResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| EngineError::DirectoryCreate {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write `content` to `path` through a temporary file and a rename.
pub fn write_atomic(path: &Path, content: &str) -> EngineResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    // Dropping a NamedTempFile deletes it, so every early return below
    // cleans up after itself.
    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| EngineError::file_write(path, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| EngineError::file_write(path, e))?;
    tmp.flush().map_err(|e| EngineError::file_write(path, e))?;
    tmp.persist(path)
        .map_err(|e| EngineError::file_write(path, e.error))?;

    tracing::debug!(path = %path.display(), bytes = content.len(), "file written");
    Ok(())
}

/// Write `content` only when it differs from what is already on disk.
///
/// Returns `true` when the file was written.
pub fn write_if_changed(path: &Path, content: &str) -> EngineResult<bool> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        if existing == content {
            return Ok(false);
        }
    }
    write_atomic(path, content)?;
    Ok(true)
}

/// Read a file, mapping failures to [`EngineError::FileRead`].
pub fn read_to_string(path: &Path) -> EngineResult<String> {
    std::fs::read_to_string(path).map_err(|e| EngineError::file_read(path, e))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/out.sql");

        write_atomic(&path, "SELECT 1;").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "SELECT 1;");

        // No temporary files are left behind
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_write_if_changed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.go");

        assert!(write_if_changed(&path, "package model\n").unwrap());
        assert!(!write_if_changed(&path, "package model\n").unwrap());
        assert!(write_if_changed(&path, "package model\n\n").unwrap());
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_to_string(Path::new("/nonexistent/polygon/file.sql")).unwrap_err();
        assert!(err.is_environment());
    }
}
