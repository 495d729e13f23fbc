//! Import extraction
//!
//! Walks the tree-sitter Python syntax tree and collects the top-level module
//! of every import statement, including imports nested in functions, classes
//! and `try` blocks. Aliases resolve to their target (`import numpy as np`
//! yields `numpy`); relative imports resolve to the sibling module they name
//! and keep their dot count.
//!
//! Source that does not parse cleanly is also scanned line by line, so
//! imports swallowed by error recovery are still reported. The error and
//! missing-token nodes themselves become [`SyntaxIssue`]s.

use crate::classifier::root_segment;
use crate::project::{relative_module_stem, CodeFiles};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single imported module, reduced to its top-level segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    /// Top-level module identifier
    pub module: String,
    /// 1-based line of the import statement
    pub line: usize,
    /// Leading dots of a relative import; 0 for absolute imports
    pub level: usize,
}

impl ImportRef {
    fn new(module: &str, line: usize, level: usize) -> Option<Self> {
        let module = root_segment(module);
        if module.is_empty() || module == "*" {
            return None;
        }
        Some(Self {
            module: module.to_string(),
            line,
            level,
        })
    }

    /// Relative import (`from . import x`, `from ..x import y`)
    #[inline]
    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.level > 0
    }

    /// Project path (without extension) a relative import names
    ///
    /// Resolved against the directory of `importer`. `None` for absolute
    /// imports and for relative imports that climb above the project root.
    #[must_use]
    pub fn relative_stem(&self, importer: &str) -> Option<String> {
        if self.is_relative() {
            relative_module_stem(importer, self.level, &self.module)
        } else {
            None
        }
    }
}

/// Parse error location in a delivered source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxIssue {
    /// File containing the error
    pub file: String,
    /// 1-based line where the error starts
    pub line: usize,
    /// Short description
    pub message: String,
}

impl std::fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

/// Imports of one source file, deduplicated by module in first-seen order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImports {
    /// File path within the project
    pub path: String,
    /// Unique imports
    pub imports: Vec<ImportRef>,
    /// Parse errors, one per line
    pub syntax_errors: Vec<SyntaxIssue>,
}

/// Reusable import scanner
///
/// Holds one tree-sitter parser; create one per analysis pass.
pub struct ImportScanner {
    parser: Option<tree_sitter::Parser>,
}

impl std::fmt::Debug for ImportScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportScanner")
            .field("tree_sitter", &self.parser.is_some())
            .finish()
    }
}

impl Default for ImportScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportScanner {
    /// Create scanner, falling back to line scanning if the grammar fails to load
    #[must_use]
    pub fn new() -> Self {
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = tree_sitter::Parser::new();
        let parser = match parser.set_language(&language) {
            Ok(()) => Some(parser),
            Err(e) => {
                tracing::warn!("python grammar unavailable, using line scan: {}", e);
                None
            }
        };
        Self { parser }
    }

    /// Extract unique imports from one source file
    pub fn scan(&mut self, source: &str) -> Vec<ImportRef> {
        self.parse(source).0
    }

    /// Extract unique imports and parse errors from one source file
    pub fn scan_file(&mut self, path: &str, source: &str) -> FileImports {
        let (imports, errors) = self.parse(source);
        let syntax_errors: Vec<_> = errors
            .into_iter()
            .map(|(line, message)| SyntaxIssue {
                file: path.to_string(),
                line,
                message,
            })
            .collect();
        if !syntax_errors.is_empty() {
            tracing::warn!(file = %path, errors = syntax_errors.len(), "source does not parse cleanly");
        }
        FileImports {
            path: path.to_string(),
            imports,
            syntax_errors,
        }
    }

    /// Extract imports from every source file, in delivery order
    pub fn scan_project(&mut self, files: &CodeFiles) -> Vec<FileImports> {
        files
            .source_files()
            .map(|(path, source)| self.scan_file(path, source))
            .collect()
    }

    fn parse(&mut self, source: &str) -> (Vec<ImportRef>, Vec<(usize, String)>) {
        let Some(tree) = self.parser.as_mut().and_then(|p| p.parse(source, None)) else {
            return (dedup_by_module(line_scan(source)), Vec::new());
        };

        let root = tree.root_node();
        let mut raw = Vec::new();
        collect_imports(root, source.as_bytes(), &mut raw);

        let mut errors = Vec::new();
        if root.has_error() {
            // Error recovery can fold whole statements into ERROR nodes
            raw.extend(line_scan(source));
            collect_syntax_errors(root, &mut errors);
            let mut seen = HashSet::new();
            errors.retain(|(line, _)| seen.insert(*line));
        }
        (dedup_by_module(raw), errors)
    }
}

/// Convenience wrapper: scan every source file of a project
#[must_use]
pub fn scan_project(files: &CodeFiles) -> Vec<FileImports> {
    ImportScanner::new().scan_project(files)
}

fn dedup_by_module(imports: Vec<ImportRef>) -> Vec<ImportRef> {
    let mut seen = HashSet::new();
    imports
        .into_iter()
        .filter(|i| seen.insert((i.module.clone(), i.level)))
        .collect()
}

fn collect_imports(node: tree_sitter::Node<'_>, src: &[u8], out: &mut Vec<ImportRef>) {
    let line = node.start_position().row + 1;

    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                if let Some(import) = target_text(name, src).and_then(|t| ImportRef::new(t, line, 0)) {
                    out.push(import);
                }
            }
            return;
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                if module.kind() == "relative_import" {
                    collect_relative(node, module, src, line, out);
                } else if let Some(import) =
                    target_text(module, src).and_then(|t| ImportRef::new(t, line, 0))
                {
                    out.push(import);
                }
            }
            return;
        }
        "future_import_statement" => {
            out.extend(ImportRef::new("__future__", line, 0));
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node.named_children(&mut cursor).collect();
    for child in children {
        collect_imports(child, src, out);
    }
}

/// `from .models import User` names `models`; `from . import models` names
/// each imported module.
fn collect_relative(
    statement: tree_sitter::Node<'_>,
    relative: tree_sitter::Node<'_>,
    src: &[u8],
    line: usize,
    out: &mut Vec<ImportRef>,
) {
    let mut cursor = relative.walk();
    let children: Vec<_> = relative.named_children(&mut cursor).collect();
    let level = children
        .iter()
        .find(|c| c.kind() == "import_prefix")
        .and_then(|prefix| prefix.utf8_text(src).ok())
        .map_or(1, |dots| dots.matches('.').count().max(1));

    if let Some(dotted) = children.iter().find(|c| c.kind() == "dotted_name") {
        out.extend(
            dotted
                .utf8_text(src)
                .ok()
                .and_then(|t| ImportRef::new(t, line, level)),
        );
        return;
    }

    let mut cursor = statement.walk();
    for name in statement.children_by_field_name("name", &mut cursor) {
        out.extend(target_text(name, src).and_then(|t| ImportRef::new(t, line, level)));
    }
}

/// One `(line, message)` per ERROR or MISSING node, outermost first
fn collect_syntax_errors(node: tree_sitter::Node<'_>, out: &mut Vec<(usize, String)>) {
    let line = node.start_position().row + 1;
    if node.is_error() {
        out.push((line, "invalid syntax".to_string()));
        return;
    }
    if node.is_missing() {
        out.push((line, format!("expected `{}`", node.kind())));
        return;
    }
    if !node.has_error() {
        return;
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    for child in children {
        collect_syntax_errors(child, out);
    }
}

/// Text of the imported module, looking through `as` aliases
fn target_text<'a>(node: tree_sitter::Node<'_>, src: &'a [u8]) -> Option<&'a str> {
    let target = if node.kind() == "aliased_import" {
        node.child_by_field_name("name")?
    } else {
        node
    };
    target.utf8_text(src).ok()
}

static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:from\s+(\.*)([\w.]*)\s+import\s+([\w\s,.*()]+)|import\s+([\w\s,.]+))")
        .expect("import pattern is valid")
});

fn line_scan(source: &str) -> Vec<ImportRef> {
    let mut out = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let Some(caps) = IMPORT_LINE.captures(line) else {
            continue;
        };
        let lineno = idx + 1;

        if let Some(names) = caps.get(4) {
            for part in names.as_str().split(',') {
                let target = part.split_whitespace().next().unwrap_or_default();
                out.extend(ImportRef::new(target, lineno, 0));
            }
            continue;
        }

        let level = caps.get(1).map_or(0, |m| m.as_str().len());
        let module = caps.get(2).map_or("", |m| m.as_str());
        if !module.is_empty() {
            out.extend(ImportRef::new(module, lineno, level));
        } else if level > 0 {
            let names = caps.get(3).map_or("", |m| m.as_str());
            for part in names.trim_matches(|c| c == '(' || c == ')').split(',') {
                let target = part.split_whitespace().next().unwrap_or_default();
                out.extend(ImportRef::new(target, lineno, level));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modules(source: &str) -> Vec<String> {
        ImportScanner::new()
            .scan(source)
            .into_iter()
            .map(|i| i.module)
            .collect()
    }

    #[test]
    fn plain_and_dotted_imports() {
        let src = "import os\nimport os.path\nimport xml.etree.ElementTree\n";
        assert_eq!(modules(src), vec!["os", "xml"]);
    }

    #[test]
    fn multiple_names_in_one_statement() {
        assert_eq!(modules("import sys, json, math\n"), vec!["sys", "json", "math"]);
    }

    #[test]
    fn aliases_resolve_to_target() {
        let src = "import numpy as np\nimport matplotlib.pyplot as plt\n";
        assert_eq!(modules(src), vec!["numpy", "matplotlib"]);
    }

    #[test]
    fn from_imports_resolve_to_root_module() {
        let src = "from PIL import Image\nfrom sklearn.model_selection import train_test_split as tts\n";
        assert_eq!(modules(src), vec!["PIL", "sklearn"]);
    }

    #[test]
    fn relative_imports() {
        let scanned = ImportScanner::new().scan("from .models import User\nfrom . import utils, config\n");
        let got: Vec<_> = scanned.iter().map(|i| (i.module.as_str(), i.level)).collect();
        assert_eq!(got, vec![("models", 1), ("utils", 1), ("config", 1)]);
    }

    #[test]
    fn nested_imports_are_found() {
        let src = r#"
def load():
    try:
        import yaml
    except ImportError:
        yaml = None

class Game:
    def run(self):
        from pygame import mixer
"#;
        assert_eq!(modules(src), vec!["yaml", "pygame"]);
    }

    #[test]
    fn future_imports_are_stdlib_module() {
        assert_eq!(modules("from __future__ import annotations\nimport os\n"), vec!["__future__", "os"]);
    }

    #[test]
    fn strings_and_comments_are_ignored() {
        let src = "# import requests\ntext = \"import flask\"\nimport os\n";
        assert_eq!(modules(src), vec!["os"]);
    }

    #[test]
    fn line_numbers_are_one_based() {
        let scanned = ImportScanner::new().scan("\n\nimport random\n");
        assert_eq!(scanned[0].line, 3);
    }

    #[test]
    fn duplicates_collapse_to_first_occurrence() {
        let scanned = ImportScanner::new().scan("import os\nfrom os import path\nimport os.path\n");
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].line, 1);
    }

    #[test]
    fn line_scan_fallback() {
        let src = "import os, sys\nfrom .models import User\nfrom . import (utils, config)\nfrom PIL import Image\n";
        let got: Vec<_> = dedup_by_module(line_scan(src))
            .into_iter()
            .map(|i| (i.module, i.level))
            .collect();
        assert_eq!(
            got,
            vec![
                ("os".to_string(), 0),
                ("sys".to_string(), 0),
                ("models".to_string(), 1),
                ("utils".to_string(), 1),
                ("config".to_string(), 1),
                ("PIL".to_string(), 0),
            ]
        );
    }

    #[test]
    fn scan_project_skips_non_source_files() {
        let mut files = CodeFiles::new();
        files.insert("main.py", "import utils\n").unwrap();
        files.insert("notes.md", "import nothing\n").unwrap();
        files.insert("utils.py", "import os\n").unwrap();

        let scanned = scan_project(&files);
        let paths: Vec<_> = scanned.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["main.py", "utils.py"]);
        assert_eq!(scanned[0].imports[0].module, "utils");
    }

    #[test]
    fn relative_levels_count_leading_dots() {
        let src = "from . import a\nfrom ..shared import b\nfrom .. import c\n";
        let scanned = ImportScanner::new().scan(src);
        let got: Vec<_> = scanned.iter().map(|i| (i.module.as_str(), i.level)).collect();
        assert_eq!(got, vec![("a", 1), ("shared", 2), ("c", 2)]);

        let got: Vec<_> = line_scan(src).into_iter().map(|i| i.level).collect();
        assert_eq!(got, vec![1, 2, 2]);
    }

    #[test]
    fn relative_stem_resolves_against_importer_directory() {
        let scanned = ImportScanner::new().scan("from .c import thing\nfrom .. import top\nimport os\n");
        assert_eq!(scanned[0].relative_stem("pkg/a.py").as_deref(), Some("pkg/c"));
        assert_eq!(scanned[1].relative_stem("pkg/a.py").as_deref(), Some("top"));
        assert_eq!(scanned[1].relative_stem("a.py"), None);
        assert_eq!(scanned[2].relative_stem("pkg/a.py"), None);
    }

    #[test]
    fn imports_after_a_syntax_error_are_still_found() {
        let src = "x = [1, 2\nimport requests\n";
        assert!(modules(src).contains(&"requests".to_string()));
    }

    #[test]
    fn syntax_errors_are_reported_per_file() {
        let mut scanner = ImportScanner::new();
        let broken = scanner.scan_file("game.py", "import os\ndef run(:\n    pass\n");
        assert_eq!(broken.imports[0].module, "os");
        assert!(!broken.syntax_errors.is_empty());
        assert!(broken.syntax_errors.iter().all(|e| e.file == "game.py"));

        let clean = scanner.scan_file("ok.py", "import os\n\ndef run():\n    pass\n");
        assert!(clean.syntax_errors.is_empty());
    }
}
