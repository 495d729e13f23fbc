//! Hermetic delivery analysis for generated Python projects
//!
//! Statically decides whether a delivered set of source files can run with
//! its declared environment:
//! - [`ImportClassifier`]: stdlib / known third-party / unknown
//! - [`DependencyAnalyzer`]: dependency records and generated manifest
//! - [`find_missing_local_files`]: local imports with no delivered file
//! - [`ComplianceChecker`]: per-import verdict against a manifest
//!
//! Generated code is never executed. Nothing here performs I/O.
//!
//! # Example
//!
//! ```
//! use codeflow_deps::{CodeFiles, ComplianceChecker, DependencyAnalyzer};
//!
//! let mut files = CodeFiles::new();
//! files.insert("main.py", "import pygame\nimport utils\n").unwrap();
//! files.insert("utils.py", "import os\n").unwrap();
//!
//! let (_, manifest) = DependencyAnalyzer::new().analyze(&files);
//! assert!(ComplianceChecker::new().check(&files, &manifest).compliant());
//! ```

pub mod analyzer;
pub mod classifier;
pub mod compliance;
pub mod containment;
pub mod error;
pub mod imports;
pub mod manifest;
pub mod project;
pub mod tables;

pub use analyzer::{
    advise, Advisory, AnalyzerOptions, DependencyAnalysis, DependencyAnalyzer, DependencyKind,
    DependencyRecord,
};
pub use classifier::{ImportClass, ImportClassifier, Resolution};
pub use compliance::{ComplianceChecker, ComplianceVerdict, Violation, ViolationReason};
pub use containment::find_missing_local_files;
pub use error::DepsError;
pub use imports::{FileImports, ImportRef, ImportScanner, SyntaxIssue};
pub use manifest::{Manifest, ManifestEntry, MANIFEST_FILE};
pub use project::{CodeFiles, LocalModules};
pub use tables::ALIAS_TABLE_VERSION;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::CodeFiles;

    pub(crate) fn project(files: &[(&str, &str)]) -> CodeFiles {
        let mut out = CodeFiles::new();
        for (path, contents) in files {
            out.insert(path, *contents).unwrap();
        }
        out
    }
}
