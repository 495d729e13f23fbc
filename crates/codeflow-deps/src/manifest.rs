//! Dependency manifest (`requirements.txt`)
//!
//! Parsing is lenient: blank lines, `#` comments and pip option lines (`-r`,
//! `--index-url`) are skipped, and each remaining line contributes one package
//! name with its version constraint, extras and environment markers stripped.
//! Names are normalized so `Scikit_Learn` and `scikit-learn` compare equal.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Manifest file name in a delivered project
pub const MANIFEST_FILE: &str = "requirements.txt";

/// Header written at the top of every generated manifest
pub const MANIFEST_HEADER: &[&str] = &[
    "# Generated Requirements",
    "# Third-party packages imported by this project",
    "# Install with: pip install -r requirements.txt",
];

const MISSING_FILES_BANNER: &str = "# WARNING: Missing local files detected";

/// One declared package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Normalized package name
    pub name: String,
    /// Version constraint as written (e.g. `>=2.5.0`), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

/// Parsed manifest, keyed by normalized package name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: IndexMap<String, ManifestEntry>,
}

impl Manifest {
    /// Parse manifest text; never fails
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut entries = IndexMap::new();
        for line in text.lines() {
            if let Some(entry) = parse_line(line) {
                entries.entry(entry.name.clone()).or_insert(entry);
            }
        }
        Self { entries }
    }

    /// Check whether a package is declared (name is normalized first)
    #[must_use]
    pub fn contains(&self, package: &str) -> bool {
        self.entries.contains_key(&normalize_name(package))
    }

    /// Declared entry for a package
    #[must_use]
    pub fn get(&self, package: &str) -> Option<&ManifestEntry> {
        self.entries.get(&normalize_name(package))
    }

    /// Declared package names in file order
    pub fn declared(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of declared packages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_line(line: &str) -> Option<ManifestEntry> {
    let line = line.split(" #").next().unwrap_or_default().trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
        return None;
    }

    let cut = line
        .find(|c: char| matches!(c, '<' | '>' | '=' | '!' | '~' | ';' | '[' | ' ' | '@' | '\t'))
        .unwrap_or(line.len());
    let name = normalize_name(&line[..cut]);
    if name.is_empty() {
        return None;
    }

    // Constraint is whatever version specifier follows the name and extras
    let rest = line[cut..].trim_start();
    let rest = match rest.strip_prefix('[') {
        Some(after) => after.split_once(']').map_or("", |(_, tail)| tail).trim_start(),
        None => rest,
    };
    let constraint = rest
        .split(';')
        .next()
        .map(str::trim)
        .filter(|c| c.starts_with(['<', '>', '=', '!', '~']))
        .map(|c| c.replace(' ', ""));

    Some(ManifestEntry { name, constraint })
}

/// Normalize a distribution name: lowercase, runs of `_`, `.` and `-` become `-`
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if matches!(c, '_' | '.' | '-') {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('-');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}

/// Render a manifest from package names
///
/// Packages are sorted and deduplicated. Each `(name, constraint)` pair is
/// written as `name` or `name<constraint>`; `missing_files` appends a warning
/// footer.
#[must_use]
pub fn render<'a>(
    packages: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
    missing_files: &[String],
) -> String {
    let lines: BTreeSet<String> = packages
        .into_iter()
        .map(|(name, constraint)| format!("{name}{}", constraint.unwrap_or_default()))
        .collect();

    let mut out = MANIFEST_HEADER.join("\n");
    out.push_str("\n\n");
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }

    if !missing_files.is_empty() {
        out.push('\n');
        out.push_str(MISSING_FILES_BANNER);
        out.push('\n');
        for path in missing_files {
            out.push_str("# Missing: ");
            out.push_str(path);
            out.push('\n');
        }
    }
    out
}
