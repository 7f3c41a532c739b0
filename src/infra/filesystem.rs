//! Filesystem operations
//!
//! Thin wrappers over `std::fs` and `walkdir` that map failures to
//! [`FilesystemError`].

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a directory and all its contents
pub fn remove_dir_all(path: &Path) -> Result<(), FilesystemError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| FilesystemError::RemoveDir {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Remove a file if it exists
pub fn remove_file(path: &Path) -> Result<(), FilesystemError> {
    if path.is_file() {
        std::fs::remove_file(path).map_err(|e| FilesystemError::RemoveFile {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Write content to a file, creating parent directories
pub fn write_file(path: &Path, content: &str) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Write content only if it differs from what is on disk
///
/// Keeps modification times stable so unchanged sources are not rebuilt.
pub fn write_file_if_changed(path: &Path, content: &str) -> Result<bool, FilesystemError> {
    if path.is_file() && read_file(path)? == content {
        return Ok(false);
    }
    write_file(path, content)?;
    Ok(true)
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Copy a file, creating the destination's parent directories
pub fn copy_file(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    if let Some(parent) = to.parent() {
        create_dir_all(parent)?;
    }
    std::fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| FilesystemError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            error: e.to_string(),
        })
}

/// Files under `dir` whose extension is one of `extensions`, sorted
///
/// Hidden entries are skipped. A missing directory yields no files.
pub fn list_files(dir: &Path, extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let walker = WalkDir::new(dir).min_depth(1);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .collect();
    files.sort();
    files
}

/// Immediate sub-directories of `dir`, sorted
///
/// Hidden entries are skipped. A missing directory yields no entries.
pub fn list_dirs(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut dirs: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(walkdir::DirEntry::into_path)
        .collect();
    dirs.sort();
    dirs
}

/// Modification-time check: whether `target` is missing or older than any source
pub fn is_stale(target: &Path, sources: &[&Path]) -> bool {
    let Ok(target_time) = std::fs::metadata(target).and_then(|m| m.modified()) else {
        return true;
    };
    sources.iter().any(|source| {
        std::fs::metadata(source)
            .and_then(|m| m.modified())
            .map_or(true, |t| t > target_time)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_files_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_file(&root.join("b.cpp"), "").unwrap();
        write_file(&root.join("a.c"), "").unwrap();
        write_file(&root.join("notes.txt"), "").unwrap();
        write_file(&root.join("sub/c.S"), "").unwrap();
        write_file(&root.join(".git/d.c"), "").unwrap();

        let flat = list_files(root, &["c", "cpp", "S"], false);
        assert_eq!(flat, vec![root.join("a.c"), root.join("b.cpp")]);

        let deep = list_files(root, &["c", "cpp", "S"], true);
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&root.join("sub/c.S")));
    }

    #[test]
    fn test_list_dirs_skips_files_and_hidden() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_file(&root.join("Servo/Servo.h"), "").unwrap();
        write_file(&root.join("Adafruit_GFX/Adafruit_GFX.h"), "").unwrap();
        write_file(&root.join(".cache/x"), "").unwrap();
        write_file(&root.join("readme.txt"), "").unwrap();

        assert_eq!(
            list_dirs(root),
            vec![root.join("Adafruit_GFX"), root.join("Servo")]
        );
        assert!(list_dirs(&root.join("missing")).is_empty());
    }

    #[test]
    fn test_write_if_changed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x/out.cpp");
        assert!(write_file_if_changed(&path, "int a;").unwrap());
        assert!(!write_file_if_changed(&path, "int a;").unwrap());
        assert!(write_file_if_changed(&path, "int b;").unwrap());
        assert_eq!(read_file(&path).unwrap(), "int b;");
    }

    #[test]
    fn test_is_stale_when_target_missing() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.c");
        write_file(&source, "").unwrap();
        assert!(is_stale(&tmp.path().join("a.o"), &[source.as_path()]));
    }

    #[test]
    fn test_copy_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("a.h");
        write_file(&from, "#pragma once").unwrap();
        let to = tmp.path().join("deep/dir/a.h");
        copy_file(&from, &to).unwrap();
        assert_eq!(read_file(&to).unwrap(), "#pragma once");
    }
}
