//! Compilation database
//!
//! Every compile command issued by a build is recorded here and written to
//! `compile_commands.json`, the format read by clangd and other tooling.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::FilesystemError;
use crate::infra::filesystem;

/// One compile command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationCommand {
    pub directory: PathBuf,
    pub arguments: Vec<String>,
    pub file: PathBuf,
}

/// Ordered set of compile commands, one per source file
#[derive(Debug, Clone, Default)]
pub struct CompilationDatabase {
    path: PathBuf,
    entries: Vec<CompilationCommand>,
}

impl CompilationDatabase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Load an existing database, or start an empty one if it cannot be read
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = filesystem::read_file(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self { path, entries }
    }

    /// Record a command, replacing any previous command for the same file
    pub fn add(&mut self, directory: &Path, arguments: Vec<String>, file: &Path) {
        let command = CompilationCommand {
            directory: directory.to_path_buf(),
            arguments,
            file: file.to_path_buf(),
        };
        match self.entries.iter_mut().find(|e| e.file == command.file) {
            Some(existing) => *existing = command,
            None => self.entries.push(command),
        }
    }

    pub fn entries(&self) -> &[CompilationCommand] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the database as pretty-printed JSON
    pub fn save(&self) -> Result<(), FilesystemError> {
        let content =
            serde_json::to_string_pretty(&self.entries).map_err(|e| FilesystemError::WriteFile {
                path: self.path.clone(),
                error: e.to_string(),
            })?;
        filesystem::write_file(&self.path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_replaces_same_file() {
        let mut db = CompilationDatabase::new("/b/compile_commands.json");
        db.add(Path::new("/b"), vec!["gcc".into(), "-O0".into()], Path::new("/s/a.c"));
        db.add(Path::new("/b"), vec!["gcc".into()], Path::new("/s/b.c"));
        db.add(Path::new("/b"), vec!["gcc".into(), "-Os".into()], Path::new("/s/a.c"));

        assert_eq!(db.entries().len(), 2);
        assert_eq!(db.entries()[0].arguments, vec!["gcc", "-Os"]);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("compile_commands.json");
        let mut db = CompilationDatabase::new(&path);
        db.add(tmp.path(), vec!["cc".into(), "-c".into(), "x.c".into()], &tmp.path().join("x.c"));
        db.save().unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&filesystem::read_file(&path).unwrap()).unwrap();
        assert_eq!(json[0]["arguments"][1], "-c");
        assert!(json[0]["directory"].is_string());

        let loaded = CompilationDatabase::load(&path);
        assert_eq!(loaded.entries(), db.entries());
    }

    #[test]
    fn test_load_missing_or_invalid_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CompilationDatabase::load(tmp.path().join("none.json")).entries().is_empty());

        let bad = tmp.path().join("bad.json");
        filesystem::write_file(&bad, "{not json").unwrap();
        assert!(CompilationDatabase::load(&bad).entries().is_empty());
    }
}
