//! Delivery compliance
//!
//! The authoritative gate before a project is deliverable. Each import in
//! each source file must be satisfiable from the standard library, a
//! declared manifest entry, or a delivered sibling file. Relative imports
//! can only be satisfied by a file in the importer's package directory.
//! Verdicts are recomputed on every call.

use crate::classifier::{ImportClass, ImportClassifier};
use crate::imports::{ImportRef, ImportScanner};
use crate::manifest::Manifest;
use crate::project::{CodeFiles, LocalModules};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Umbrella category shared by every violation reason
pub const UNDECLARED_DEPENDENCY: &str = "undeclared_dependency";

/// Why an import failed the compliance check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    /// Identifier is in no table and no sibling file provides it
    UnresolvedLocalImport,
    /// Known third-party package absent from the manifest
    MissingManifestEntry,
}

impl ViolationReason {
    /// Stable reason code
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UnresolvedLocalImport => "unresolved_local_import",
            Self::MissingManifestEntry => "missing_manifest_entry",
        }
    }

    /// Umbrella category (always `undeclared_dependency`)
    #[inline]
    #[must_use]
    pub const fn category(self) -> &'static str {
        UNDECLARED_DEPENDENCY
    }
}

impl std::fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One offending import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// File containing the import
    pub file: String,
    /// Top-level import identifier
    pub identifier: String,
    /// Reason code
    pub reason: ViolationReason,
    /// Distribution that should be declared (missing manifest entries only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// 1-based line of the first offending import
    pub line: usize,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {} ({})", self.file, self.line, self.identifier, self.reason)?;
        if let Some(package) = &self.package {
            write!(f, ", declare {package}")?;
        }
        Ok(())
    }
}

/// Compliance result; `compliant` holds exactly when there are no violations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "VerdictRepr", into = "VerdictRepr")]
pub struct ComplianceVerdict {
    violations: Vec<Violation>,
}

impl ComplianceVerdict {
    /// Build from violations in report order
    #[must_use]
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// True when every import is satisfiable
    #[inline]
    #[must_use]
    pub fn compliant(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations in file then import order
    #[inline]
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Number of violations
    #[inline]
    #[must_use]
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    /// Violations with a specific reason
    pub fn by_reason(&self, reason: ViolationReason) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.reason == reason)
    }
}

#[derive(Serialize, Deserialize)]
struct VerdictRepr {
    compliant: bool,
    violations: Vec<Violation>,
}

impl From<VerdictRepr> for ComplianceVerdict {
    fn from(repr: VerdictRepr) -> Self {
        Self::from_violations(repr.violations)
    }
}

impl From<ComplianceVerdict> for VerdictRepr {
    fn from(verdict: ComplianceVerdict) -> Self {
        Self {
            compliant: verdict.compliant(),
            violations: verdict.violations,
        }
    }
}

/// Delivery compliance checker
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplianceChecker {
    classifier: ImportClassifier,
}

impl ComplianceChecker {
    /// Create checker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every source file against the declared manifest
    #[must_use]
    pub fn check(&self, files: &CodeFiles, manifest_text: &str) -> ComplianceVerdict {
        let manifest = Manifest::parse(manifest_text);
        let local = files.local_modules();
        let mut scanner = ImportScanner::new();

        let mut violations = Vec::new();
        for (path, source) in files.source_files() {
            // A relative and an absolute import of the same name count once
            let mut reported = HashSet::new();
            for import in scanner.scan(source) {
                if reported.contains(&import.module) {
                    continue;
                }
                if let Some(v) = self.check_import(path, &import, &manifest, &local) {
                    reported.insert(import.module.clone());
                    tracing::warn!(
                        file = %v.file,
                        identifier = %v.identifier,
                        reason = %v.reason,
                        "compliance violation"
                    );
                    violations.push(v);
                }
            }
        }

        let verdict = ComplianceVerdict::from_violations(violations);
        tracing::info!(
            files = files.len(),
            declared = manifest.len(),
            compliant = verdict.compliant(),
            violations = verdict.violation_count(),
            "compliance check complete"
        );
        verdict
    }

    fn check_import(
        &self,
        path: &str,
        import: &ImportRef,
        manifest: &Manifest,
        local: &LocalModules,
    ) -> Option<Violation> {
        let identifier = import.module.as_str();
        let class = if import.is_relative() {
            if import.relative_stem(path).is_some_and(|stem| local.provides(&stem)) {
                return None;
            }
            ImportClass::Unknown
        } else {
            let class = self.classifier.classify(identifier);
            if class.is_stdlib()
                || class.canonical_name(identifier).is_some_and(|name| manifest.contains(name))
                || local.contains(identifier)
            {
                return None;
            }
            class
        };

        let (reason, package) = match class {
            ImportClass::ThirdParty(package) => (ViolationReason::MissingManifestEntry, Some(package)),
            ImportClass::Stdlib | ImportClass::Unknown => (ViolationReason::UnresolvedLocalImport, None),
        };
        Some(Violation {
            file: path.to_string(),
            identifier: identifier.to_string(),
            reason,
            package,
            line: import.line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::project;
    use pretty_assertions::assert_eq;

    #[test]
    fn stdlib_only_is_compliant_with_empty_manifest() {
        let files = project(&[("main.py", "import os\nimport json\nfrom datetime import date\n")]);
        let verdict = ComplianceChecker::new().check(&files, "");
        assert!(verdict.compliant());
        assert!(verdict.violations().is_empty());
    }

    #[test]
    fn declared_third_party_is_compliant() {
        let files = project(&[("main.py", "import pygame\nfrom PIL import Image\n")]);
        let verdict = ComplianceChecker::new().check(&files, "# deps\npygame>=2.5.0\nPillow\n");
        assert!(verdict.compliant());
    }

    #[test]
    fn undeclared_local_and_third_party_each_violate() {
        let files = project(&[("main.py", "import database\nimport requests\nimport os\n")]);
        let verdict = ComplianceChecker::new().check(&files, "flask\n");

        assert!(!verdict.compliant());
        let got: Vec<_> = verdict
            .violations()
            .iter()
            .map(|v| (v.identifier.as_str(), v.reason))
            .collect();
        assert_eq!(
            got,
            vec![
                ("database", ViolationReason::UnresolvedLocalImport),
                ("requests", ViolationReason::MissingManifestEntry),
            ]
        );
        assert_eq!(verdict.violations()[1].package.as_deref(), Some("requests"));
        assert_eq!(verdict.violations()[1].line, 2);
    }

    #[test]
    fn sibling_file_satisfies_import() {
        let files = project(&[
            ("main.py", "import utils\nimport yaml\n"),
            ("utils.py", "import os\n"),
            ("yaml.py", "def load(s): return s\n"),
        ]);
        assert!(ComplianceChecker::new().check(&files, "").compliant());
    }

    #[test]
    fn unknown_declared_under_own_name_passes() {
        let files = project(&[("main.py", "import somelib\n")]);
        assert!(ComplianceChecker::new().check(&files, "somelib==1.0\n").compliant());
    }

    #[test]
    fn alias_must_be_declared_by_distribution_name() {
        let files = project(&[("main.py", "import cv2\n")]);
        let checker = ComplianceChecker::new();
        assert!(!checker.check(&files, "cv2\n").compliant());
        assert!(checker.check(&files, "opencv-python\n").compliant());
    }

    #[test]
    fn relative_import_needs_sibling_not_manifest() {
        let files = project(&[("app.py", "from .models import User\n")]);
        let verdict = ComplianceChecker::new().check(&files, "models\n");
        assert_eq!(verdict.violation_count(), 1);
        assert_eq!(verdict.violations()[0].reason, ViolationReason::UnresolvedLocalImport);
    }

    #[test]
    fn hermetic_package_with_relative_imports_is_compliant() {
        let files = project(&[
            ("main.py", "from pkg import a\n"),
            ("pkg/__init__.py", ""),
            ("pkg/a.py", "from . import b\nfrom .c import thing\n"),
            ("pkg/b.py", ""),
            ("pkg/c.py", "thing = 1\n"),
        ]);
        let verdict = ComplianceChecker::new().check(&files, "");
        assert!(verdict.compliant(), "{:?}", verdict.violations());
    }

    #[test]
    fn relative_import_ignores_top_level_namesake() {
        let files = project(&[
            ("models.py", "class X: pass\n"),
            ("pkg/app.py", "from .models import X\n"),
        ]);
        let verdict = ComplianceChecker::new().check(&files, "");
        assert!(!verdict.compliant());
        assert_eq!(verdict.violations()[0].file, "pkg/app.py");
        assert_eq!(verdict.violations()[0].identifier, "models");
        assert_eq!(verdict.violations()[0].reason, ViolationReason::UnresolvedLocalImport);
    }

    #[test]
    fn import_after_syntax_error_must_be_declared() {
        let files = project(&[("main.py", "x = [1, 2\nimport requests\n")]);
        let checker = ComplianceChecker::new();
        let verdict = checker.check(&files, "");
        assert!(!verdict.compliant());
        assert_eq!(verdict.violations()[0].identifier, "requests");
        assert!(checker.check(&files, "requests\n").compliant());
    }

    #[test]
    fn violations_follow_delivery_order() {
        let files = project(&[("b.py", "import ghost\n"), ("a.py", "import numpy\n")]);
        let verdict = ComplianceChecker::new().check(&files, "");
        let files: Vec<_> = verdict.violations().iter().map(|v| v.file.as_str()).collect();
        assert_eq!(files, vec!["b.py", "a.py"]);
        assert_eq!(verdict.by_reason(ViolationReason::MissingManifestEntry).count(), 1);
    }

    #[test]
    fn verdict_recomputes_after_mutation() {
        let mut files = project(&[("main.py", "import helpers\n")]);
        let checker = ComplianceChecker::new();
        assert!(!checker.check(&files, "").compliant());

        files.insert("helpers.py", "").unwrap();
        assert!(checker.check(&files, "").compliant());
    }

    #[test]
    fn verdict_serializes_compliant_flag() {
        let verdict = ComplianceVerdict::from_violations(vec![Violation {
            file: "main.py".to_string(),
            identifier: "numpy".to_string(),
            reason: ViolationReason::MissingManifestEntry,
            package: Some("numpy".to_string()),
            line: 1,
        }]);
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["compliant"], false);
        assert_eq!(json["violations"][0]["reason"], "missing_manifest_entry");

        let back: ComplianceVerdict = serde_json::from_value(json).unwrap();
        assert_eq!(back, verdict);
        assert_eq!(ViolationReason::MissingManifestEntry.category(), "undeclared_dependency");
    }

    #[test]
    fn violation_display() {
        let v = Violation {
            file: "main.py".to_string(),
            identifier: "cv2".to_string(),
            reason: ViolationReason::MissingManifestEntry,
            package: Some("opencv-python".to_string()),
            line: 3,
        };
        assert_eq!(v.to_string(), "main.py:3: cv2 (missing_manifest_entry), declare opencv-python");
    }
}
