//! Dependency analysis
//!
//! Scans every delivered source file, classifies each unique import, and
//! renders the `requirements.txt` manifest. Only known third-party packages
//! that no sibling file shadows reach the manifest; unknown identifiers are
//! treated as local module references and surface through
//! [`find_missing_local_files`](crate::find_missing_local_files). Relative
//! imports resolve against the importing file's package directory.

use crate::classifier::{ImportClassifier, Resolution};
use crate::containment;
use crate::imports::{ImportRef, ImportScanner, SyntaxIssue};
use crate::manifest;
use crate::project::{CodeFiles, LocalModules};
use crate::tables;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Resolved kind of an import identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Python standard library
    Stdlib,
    /// Known third-party distribution
    ThirdParty,
    /// Provided by a delivered sibling file
    Local,
    /// Not in any table and not delivered
    Unknown,
}

impl DependencyKind {
    /// Lowercase name used in reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdlib => "stdlib",
            Self::ThirdParty => "third_party",
            Self::Local => "local",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unique import identifier and how it resolves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Top-level import identifier
    pub identifier: String,
    /// Resolved kind
    pub kind: DependencyKind,
    /// Installable distribution name (third-party only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

/// Non-fatal observation about the dependency set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    /// Stable identifier
    pub code: String,
    /// Human-readable text
    pub message: String,
}

impl Advisory {
    fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Manifest rendering options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerOptions {
    /// Append recommended lower bounds (`pygame>=2.5.0`)
    pub pin_versions: bool,
    /// Append the missing-local-files warning footer
    pub annotate_missing: bool,
}

/// Full analysis output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    /// One record per unique identifier, sorted by identifier
    pub records: Vec<DependencyRecord>,
    /// Rendered `requirements.txt`
    pub manifest: String,
    /// Local modules imported but not delivered
    pub missing_local_files: Vec<String>,
    /// Dependency-set observations
    pub advisories: Vec<Advisory>,
    /// Parse errors found while scanning, in delivery order
    #[serde(default)]
    pub syntax_errors: Vec<SyntaxIssue>,
}

impl DependencyAnalysis {
    /// Distinct third-party package names, sorted
    #[must_use]
    pub fn packages(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .filter_map(|r| r.package.as_deref())
            .collect();
        set.into_iter().collect()
    }
}

/// Dependency analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyAnalyzer {
    classifier: ImportClassifier,
    options: AnalyzerOptions,
}

impl DependencyAnalyzer {
    /// Create analyzer with default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace rendering options
    #[must_use]
    pub fn with_options(mut self, options: AnalyzerOptions) -> Self {
        self.options = options;
        self
    }

    /// Rendering options in use
    #[inline]
    #[must_use]
    pub fn options(&self) -> AnalyzerOptions {
        self.options
    }

    /// Dependency list and manifest text
    #[must_use]
    pub fn analyze(&self, files: &CodeFiles) -> (Vec<DependencyRecord>, String) {
        let analysis = self.analyze_project(files);
        (analysis.records, analysis.manifest)
    }

    /// Dependency list, manifest, missing local files and advisories
    #[must_use]
    pub fn analyze_project(&self, files: &CodeFiles) -> DependencyAnalysis {
        let local = files.local_modules();
        let scanned = ImportScanner::new().scan_project(files);

        let mut by_identifier: BTreeMap<String, DependencyRecord> = BTreeMap::new();
        for file in &scanned {
            for import in &file.imports {
                let record = self.record_for(&file.path, import, &local);
                by_identifier
                    .entry(import.module.clone())
                    .and_modify(|existing| {
                        // An absolute import of the same name decides the kind
                        if existing.kind == DependencyKind::Unknown && !import.is_relative() {
                            *existing = record.clone();
                        }
                    })
                    .or_insert(record);
            }
        }
        let records: Vec<_> = by_identifier.into_values().collect();

        let missing_local_files = containment::missing_from_scan(&self.classifier, &scanned, &local);

        let packages: BTreeSet<&str> = records.iter().filter_map(|r| r.package.as_deref()).collect();
        let pins = self.options.pin_versions;
        let footer: &[String] = if self.options.annotate_missing {
            &missing_local_files
        } else {
            &[]
        };
        let manifest = manifest::render(
            packages
                .iter()
                .map(|p| (*p, if pins { tables::version_pin(p) } else { None })),
            footer,
        );

        let advisories = advise(&records);
        let syntax_errors: Vec<_> = scanned.into_iter().flat_map(|f| f.syntax_errors).collect();

        tracing::info!(
            files = files.len(),
            identifiers = records.len(),
            packages = packages.len(),
            missing = missing_local_files.len(),
            syntax_errors = syntax_errors.len(),
            "dependency analysis complete"
        );

        DependencyAnalysis {
            records,
            manifest,
            missing_local_files,
            advisories,
            syntax_errors,
        }
    }

    fn record_for(&self, importer: &str, import: &ImportRef, local: &LocalModules) -> DependencyRecord {
        let (kind, package) = match resolve_import(&self.classifier, importer, import, local) {
            Resolution::Stdlib => (DependencyKind::Stdlib, None),
            Resolution::Local => (DependencyKind::Local, None),
            Resolution::ThirdParty(package) => (DependencyKind::ThirdParty, Some(package)),
            Resolution::Unknown => (DependencyKind::Unknown, None),
        };
        tracing::debug!(identifier = %import.module, kind = %kind, "classified import");
        DependencyRecord {
            identifier: import.module.clone(),
            kind,
            package,
        }
    }
}

/// Resolve one import occurrence in `importer`
///
/// Relative imports always name local modules and only the importer's
/// package directory can provide them.
pub(crate) fn resolve_import(
    classifier: &ImportClassifier,
    importer: &str,
    import: &ImportRef,
    local: &LocalModules,
) -> Resolution {
    if !import.is_relative() {
        return classifier.resolve(&import.module, local);
    }
    match import.relative_stem(importer) {
        Some(stem) if local.provides(&stem) => Resolution::Local,
        _ => Resolution::Unknown,
    }
}

/// Observations about commonly mismatched package combinations
#[must_use]
pub fn advise(records: &[DependencyRecord]) -> Vec<Advisory> {
    let has = |name: &str| records.iter().any(|r| r.package.as_deref() == Some(name));
    let mut advisories = Vec::new();

    if has("tensorflow") && has("torch") {
        advisories.push(Advisory::new(
            "tensorflow_torch_conflict",
            "tensorflow and torch together may require conflicting CUDA versions",
        ));
    }
    if has("fastapi") && !has("uvicorn") {
        advisories.push(Advisory::new(
            "fastapi_without_uvicorn",
            "fastapi applications need an ASGI server; consider adding uvicorn",
        ));
    }
    if has("pandas") && !has("numpy") {
        advisories.push(Advisory::new(
            "pandas_without_numpy",
            "pandas projects usually use numpy directly; consider declaring it",
        ));
    }
    advisories
}
