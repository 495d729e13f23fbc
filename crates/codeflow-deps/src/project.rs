//! Delivered project files
//!
//! [`CodeFiles`] maps relative paths to file contents and keeps the order in
//! which files were delivered, so every report derived from it is stable.

use crate::error::DepsError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Extension of analyzable source files (without dot)
pub const SOURCE_EXTENSION: &str = "py";

/// Package marker file name
const PACKAGE_INIT: &str = "__init__.py";

/// Relative path → contents, in delivery order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeFiles {
    files: IndexMap<String, String>,
}

impl CodeFiles {
    /// Create empty file set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, replacing any previous contents at the same path
    ///
    /// Paths are normalized: backslashes become `/`, leading `./` is dropped.
    ///
    /// # Errors
    /// Returns error for empty, absolute, or root-escaping paths
    pub fn insert(
        &mut self,
        path: impl AsRef<str>,
        contents: impl Into<String>,
    ) -> Result<Option<String>, DepsError> {
        let path = normalize_path(path.as_ref())?;
        Ok(self.files.insert(path, contents.into()))
    }

    /// Remove a file
    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.shift_remove(path)
    }

    /// Get file contents
    #[inline]
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Check whether a path was delivered
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when no files were delivered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate `(path, contents)` in delivery order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Iterate paths in delivery order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Iterate source files only
    pub fn source_files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(p, _)| is_source_path(p))
    }

    /// Total size of all contents in bytes
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.files.values().map(String::len).sum()
    }

    /// Module roots importable from the project directory
    #[must_use]
    pub fn local_modules(&self) -> LocalModules {
        LocalModules::from_paths(self.paths())
    }
}

impl<'a> IntoIterator for &'a CodeFiles {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Set of top-level module names backed by delivered source files
///
/// `utils.py` provides `utils`; `pkg/__init__.py` and `pkg/helpers.py` both
/// provide `pkg`. The delivered source paths are kept for resolving relative
/// imports inside packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalModules {
    roots: HashSet<String>,
    sources: HashSet<String>,
}

impl LocalModules {
    /// Build from delivered paths
    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let sources: HashSet<String> = paths
            .into_iter()
            .filter(|p| is_source_path(p))
            .map(str::to_string)
            .collect();
        let roots = sources.iter().filter_map(|p| module_root(p)).collect();
        Self { roots, sources }
    }

    /// Check whether `identifier` is provided by a sibling file
    #[inline]
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.roots.contains(identifier)
    }

    /// Check whether a module path is delivered
    ///
    /// `pkg/b` is provided by `pkg/b.py` or by any source file under `pkg/b/`.
    #[must_use]
    pub fn provides(&self, stem: &str) -> bool {
        if self.sources.contains(&module_file_path(stem)) {
            return true;
        }
        let prefix = format!("{stem}/");
        self.sources.iter().any(|p| p.starts_with(&prefix))
    }

    /// Number of local module roots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// True when the project provides no modules
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Expected source path for a local module identifier
#[inline]
#[must_use]
pub fn module_file_path(identifier: &str) -> String {
    format!("{identifier}.{SOURCE_EXTENSION}")
}

/// Module path named by a relative import, without extension
///
/// One dot resolves in the importer's directory and each further dot climbs
/// one level: `from . import b` in `pkg/a.py` names `pkg/b`. Returns `None`
/// when the import climbs above the project root.
#[must_use]
pub fn relative_module_stem(importer: &str, level: usize, module: &str) -> Option<String> {
    let mut dirs: Vec<&str> = importer.split('/').collect();
    dirs.pop();
    for _ in 1..level {
        dirs.pop()?;
    }
    dirs.push(module);
    Some(dirs.join("/"))
}

/// Check whether a path names an analyzable source file
#[inline]
#[must_use]
pub fn is_source_path(path: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
}

fn module_root(path: &str) -> Option<String> {
    match path.split_once('/') {
        Some((dir, _)) if !dir.is_empty() => Some(dir.to_string()),
        Some(_) => None,
        None if path == PACKAGE_INIT => None,
        None => path
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .filter(|s| !s.is_empty()),
    }
}

fn normalize_path(raw: &str) -> Result<String, DepsError> {
    let unified = raw.trim().replace('\\', "/");
    if unified.starts_with('/') || unified.chars().nth(1) == Some(':') {
        return Err(DepsError::AbsolutePath(raw.to_string()));
    }

    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(DepsError::PathEscapesRoot(raw.to_string())),
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(DepsError::EmptyPath);
    }
    Ok(parts.join("/"))
}

impl TryFrom<Vec<(String, String)>> for CodeFiles {
    type Error = DepsError;

    fn try_from(entries: Vec<(String, String)>) -> Result<Self, Self::Error> {
        let mut files = Self::new();
        for (path, contents) in entries {
            files.insert(path, contents)?;
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_normalizes_paths() {
        let mut files = CodeFiles::new();
        files.insert("./src\\app.py", "x = 1").unwrap();
        assert!(files.contains("src/app.py"));
        assert_eq!(files.get("src/app.py"), Some("x = 1"));
    }

    #[test]
    fn insert_rejects_bad_paths() {
        let mut files = CodeFiles::new();
        assert_eq!(files.insert("", ""), Err(DepsError::EmptyPath));
        assert!(matches!(
            files.insert("../x.py", ""),
            Err(DepsError::PathEscapesRoot(_))
        ));
        assert!(matches!(
            files.insert("/abs.py", ""),
            Err(DepsError::AbsolutePath(_))
        ));
        assert!(matches!(
            files.insert("C:\\abs.py", ""),
            Err(DepsError::AbsolutePath(_))
        ));
    }

    #[test]
    fn delivery_order_preserved() {
        let mut files = CodeFiles::new();
        files.insert("b.py", "").unwrap();
        files.insert("a.py", "").unwrap();
        files.insert("c.txt", "").unwrap();

        let paths: Vec<_> = files.paths().collect();
        assert_eq!(paths, vec!["b.py", "a.py", "c.txt"]);

        let sources: Vec<_> = files.source_files().map(|(p, _)| p).collect();
        assert_eq!(sources, vec!["b.py", "a.py"]);
    }

    #[test]
    fn local_modules_from_files_and_packages() {
        let local = LocalModules::from_paths([
            "main.py",
            "utils.py",
            "game/__init__.py",
            "models/user.py",
            "README.md",
            "__init__.py",
        ]);

        assert!(local.contains("main"));
        assert!(local.contains("utils"));
        assert!(local.contains("game"));
        assert!(local.contains("models"));
        assert!(!local.contains("README"));
        assert!(!local.contains("__init__"));
        assert_eq!(local.len(), 4);
    }

    #[test]
    fn total_bytes_counts_all_files() {
        let mut files = CodeFiles::new();
        files.insert("a.py", "abc").unwrap();
        files.insert("b.md", "de").unwrap();
        assert_eq!(files.total_bytes(), 5);
    }

    #[test]
    fn module_file_path_uses_source_extension() {
        assert_eq!(module_file_path("database"), "database.py");
        assert!(is_source_path("x/y.PY"));
        assert!(!is_source_path("requirements.txt"));
    }

    #[test]
    fn relative_stems_follow_package_layout() {
        assert_eq!(relative_module_stem("pkg/a.py", 1, "b").as_deref(), Some("pkg/b"));
        assert_eq!(relative_module_stem("pkg/sub/a.py", 2, "c").as_deref(), Some("pkg/c"));
        assert_eq!(relative_module_stem("app.py", 1, "models").as_deref(), Some("models"));
        assert_eq!(relative_module_stem("pkg/a.py", 3, "x"), None);
    }

    #[test]
    fn provides_matches_files_and_packages() {
        let local = LocalModules::from_paths(["pkg/a.py", "pkg/sub/__init__.py", "notes/b.md"]);
        assert!(local.provides("pkg/a"));
        assert!(local.provides("pkg/sub"));
        assert!(local.provides("pkg"));
        assert!(!local.provides("pkg/b"));
        assert!(!local.provides("notes/b"));
        assert!(!local.provides("a"));
    }
}
