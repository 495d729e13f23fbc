//! Self-containment validation
//!
//! Every import that is neither stdlib nor a known third-party package is
//! assumed to reference a local module. The check is presence-based only:
//! `<identifier>.py`, `<identifier>/__init__.py` or any file under
//! `<identifier>/` satisfies it. Relative imports are looked up the same way
//! inside the importing file's package directory.

use crate::analyzer::resolve_import;
use crate::classifier::{ImportClassifier, Resolution};
use crate::imports::{FileImports, ImportRef, ImportScanner};
use crate::project::{module_file_path, CodeFiles, LocalModules};
use indexmap::IndexSet;

/// Local module files imported but not delivered
///
/// Deduplicated in first-seen order, walking files in delivery order.
#[must_use]
pub fn find_missing_local_files(files: &CodeFiles) -> Vec<String> {
    let scanned = ImportScanner::new().scan_project(files);
    let missing = missing_from_scan(&ImportClassifier::new(), &scanned, &files.local_modules());
    if !missing.is_empty() {
        tracing::warn!(count = missing.len(), files = ?missing, "missing local files");
    }
    missing
}

pub(crate) fn missing_from_scan(
    classifier: &ImportClassifier,
    scanned: &[FileImports],
    local: &LocalModules,
) -> Vec<String> {
    let mut missing = IndexSet::new();
    for file in scanned {
        for import in &file.imports {
            if resolve_import(classifier, &file.path, import, local) == Resolution::Unknown {
                missing.insert(expected_path(&file.path, import));
            }
        }
    }
    missing.into_iter().collect()
}

/// File that would satisfy `import` in `importer`
pub(crate) fn expected_path(importer: &str, import: &ImportRef) -> String {
    let stem = import.relative_stem(importer);
    module_file_path(stem.as_deref().unwrap_or(&import.module))
}
