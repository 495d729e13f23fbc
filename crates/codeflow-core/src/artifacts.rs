//! Final artifact set
//!
//! Packages the delivered source files with the generated documents
//! (`spec.md`, `plan.md`, `README.md`) and the generated manifest. Generated
//! documents replace model-supplied files of the same name.

use crate::types::RequestId;
use chrono::{DateTime, Utc};
use codeflow_deps::{CodeFiles, DependencyAnalysis, SyntaxIssue, ALIAS_TABLE_VERSION, MANIFEST_FILE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Specification document name
pub const SPEC_DOCUMENT: &str = "spec.md";

/// Plan document name
pub const PLAN_DOCUMENT: &str = "plan.md";

/// Readme name
pub const README_DOCUMENT: &str = "README.md";

/// Entry point candidates, in priority order
pub const MAIN_FILE_CANDIDATES: &[&str] = &["main.py", "app.py", "game.py"];

/// Pick the entry point: a known candidate, else the first Python file
#[must_use]
pub fn detect_main_file(files: &CodeFiles) -> Option<String> {
    MAIN_FILE_CANDIDATES
        .iter()
        .find(|c| files.contains(c))
        .map(|c| (*c).to_string())
        .or_else(|| files.source_files().next().map(|(p, _)| p.to_string()))
}

/// Filesystem-safe project name derived from the creation time
#[must_use]
pub fn project_name(created_at: DateTime<Utc>) -> String {
    format!("generated_project_{}", created_at.format("%Y%m%d_%H%M%S"))
}

/// Artifact name → contents, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    project_name: String,
    main_file: String,
    files: BTreeMap<String, String>,
}

impl ArtifactSet {
    /// Assemble the artifact set of a delivered project
    ///
    /// Returns `None` when the project has no Python source file.
    #[must_use]
    pub fn package(inputs: &PackageInputs<'_>) -> Option<Self> {
        let main_file = detect_main_file(inputs.files)?;
        let project_name = project_name(inputs.created_at);

        let mut files: BTreeMap<String, String> = inputs
            .files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();

        let documents = [
            (SPEC_DOCUMENT, render_spec(inputs)),
            (PLAN_DOCUMENT, render_plan(inputs)),
            (README_DOCUMENT, render_readme(inputs, &project_name, &main_file)),
            (MANIFEST_FILE, inputs.analysis.manifest.clone()),
        ];
        for (name, contents) in documents {
            if files.insert(name.to_string(), contents).is_some() {
                tracing::debug!(artifact = name, "generated document replaced delivered file");
            }
        }

        Some(Self {
            project_name,
            main_file,
            files,
        })
    }

    /// Generated project name
    #[inline]
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Entry point
    #[inline]
    #[must_use]
    pub fn main_file(&self) -> &str {
        &self.main_file
    }

    /// Artifact contents by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// Artifact names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Iterate `(name, contents)`, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    /// Number of artifacts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size in bytes
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.files.values().map(String::len).sum()
    }

    /// Name → contents mapping
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.files
    }
}

/// Everything needed to assemble an [`ArtifactSet`]
#[derive(Debug, Clone, Copy)]
pub struct PackageInputs<'a> {
    /// Validated user input
    pub input: &'a str,
    /// Specify phase output
    pub specification: &'a str,
    /// Plan phase output
    pub plan: &'a str,
    /// Delivered source files
    pub files: &'a CodeFiles,
    /// Dependency analysis of `files`
    pub analysis: &'a DependencyAnalysis,
    /// Request creation time
    pub created_at: DateTime<Utc>,
}

fn render_spec(inputs: &PackageInputs<'_>) -> String {
    format!(
        "# Project Specification\n\n\
         **Generated**: {}\n\
         **Request**: {}\n\n\
         ---\n\n\
         {}\n",
        inputs.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        inputs.input,
        inputs.specification.trim(),
    )
}

fn render_plan(inputs: &PackageInputs<'_>) -> String {
    let mut out = format!(
        "# Implementation Plan\n\n**Request**: {}\n\n---\n\n{}\n\n## Delivered Files\n\n",
        inputs.input,
        inputs.plan.trim(),
    );
    for path in inputs.files.paths() {
        out.push_str(&format!("- `{path}`\n"));
    }
    out.push_str("\n## Dependencies\n\n");
    push_dependency_list(&mut out, inputs.analysis);
    out
}

fn render_readme(inputs: &PackageInputs<'_>, project_name: &str, main_file: &str) -> String {
    let mut out = format!(
        "# {project_name}\n\n{}\n\n## Requirements\n\n- Python 3.8 or newer\n",
        inputs.input
    );
    push_dependency_list(&mut out, inputs.analysis);

    out.push_str("\n## Setup\n\n```bash\n");
    if !inputs.analysis.packages().is_empty() {
        out.push_str(&format!("pip install -r {MANIFEST_FILE}\n"));
    }
    out.push_str(&format!("python {main_file}\n```\n\n## Project Structure\n\n```\n"));
    for path in inputs.files.paths() {
        out.push_str(path);
        out.push('\n');
    }
    out.push_str(&format!(
        "{SPEC_DOCUMENT}\n{PLAN_DOCUMENT}\n{MANIFEST_FILE}\n{README_DOCUMENT}\n```\n"
    ));

    let missing = &inputs.analysis.missing_local_files;
    let syntax_errors = &inputs.analysis.syntax_errors;
    if !missing.is_empty() || !syntax_errors.is_empty() {
        out.push_str("\n## Known Issues\n");
    }
    if !missing.is_empty() {
        out.push_str("\nThe following local modules are imported but were not delivered:\n\n");
        for path in missing {
            out.push_str(&format!("- `{path}`\n"));
        }
    }
    if !syntax_errors.is_empty() {
        out.push_str("\nThe following locations do not parse as Python:\n\n");
        for issue in syntax_errors {
            out.push_str(&format!("- `{}` line {}: {}\n", issue.file, issue.line, issue.message));
        }
    }
    out
}

fn push_dependency_list(out: &mut String, analysis: &DependencyAnalysis) {
    let packages = analysis.packages();
    if packages.is_empty() {
        out.push_str("- Standard library only\n");
    }
    for package in packages {
        out.push_str(&format!("- {package}\n"));
    }
}

/// Metadata stored with the artifact snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Snapshot identifier
    pub id: Uuid,
    /// Request that produced the project
    pub request_id: RequestId,
    /// Generated project name
    pub project_name: String,
    /// Request creation time
    pub created_at: DateTime<Utc>,
    /// Third-party packages
    pub dependencies: Vec<String>,
    /// Number of artifacts
    pub file_count: usize,
    /// Total artifact size in bytes
    pub total_bytes: usize,
    /// Entry point
    pub main_file: String,
    /// Compliance of the delivery
    pub compliant: bool,
    /// Local modules imported but not delivered
    pub missing_local_files: Vec<String>,
    /// Parse errors in delivered source files
    #[serde(default)]
    pub syntax_errors: Vec<SyntaxIssue>,
    /// Alias table used for classification
    pub alias_table_version: u32,
}

impl ProjectMetadata {
    /// Describe an artifact set
    #[must_use]
    pub fn describe(
        request_id: RequestId,
        created_at: DateTime<Utc>,
        artifacts: &ArtifactSet,
        analysis: &DependencyAnalysis,
        compliant: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            project_name: artifacts.project_name().to_string(),
            created_at,
            dependencies: analysis.packages().into_iter().map(str::to_string).collect(),
            file_count: artifacts.len(),
            total_bytes: artifacts.total_bytes(),
            main_file: artifacts.main_file().to_string(),
            compliant,
            missing_local_files: analysis.missing_local_files.clone(),
            syntax_errors: analysis.syntax_errors.clone(),
            alias_table_version: ALIAS_TABLE_VERSION,
        }
    }
}

/// Complete final snapshot handed to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSnapshot {
    /// Project metadata
    pub metadata: ProjectMetadata,
    /// All artifacts
    pub artifacts: ArtifactSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use codeflow_deps::DependencyAnalyzer;

    fn files(entries: &[(&str, &str)]) -> CodeFiles {
        let mut out = CodeFiles::new();
        for (p, c) in entries {
            out.insert(p, *c).unwrap();
        }
        out
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn main_file_priority() {
        assert_eq!(
            detect_main_file(&files(&[("game.py", ""), ("app.py", "")])).as_deref(),
            Some("app.py")
        );
        assert_eq!(
            detect_main_file(&files(&[("notes.md", ""), ("snake.py", ""), ("x.py", "")])).as_deref(),
            Some("snake.py")
        );
        assert_eq!(detect_main_file(&files(&[("data.json", "")])), None);
    }

    #[test]
    fn project_name_uses_utc_timestamp() {
        assert_eq!(project_name(fixed_time()), "generated_project_20240309_140507");
    }

    #[test]
    fn package_contains_required_artifacts() {
        let files = files(&[("main.py", "import pygame\nimport utils\n"), ("utils.py", "")]);
        let analysis = DependencyAnalyzer::new().analyze_project(&files);
        let set = ArtifactSet::package(&PackageInputs {
            input: "snake game",
            specification: "# Spec\nA snake game.",
            plan: "# Plan\nUse pygame.",
            files: &files,
            analysis: &analysis,
            created_at: fixed_time(),
        })
        .unwrap();

        let names: Vec<_> = set.names().collect();
        assert_eq!(
            names,
            vec!["README.md", "main.py", "plan.md", "requirements.txt", "spec.md", "utils.py"]
        );
        assert_eq!(set.main_file(), "main.py");
        assert!(set.get("spec.md").unwrap().contains("A snake game."));
        assert!(set.get("plan.md").unwrap().contains("- pygame"));
        assert!(set.get("README.md").unwrap().contains("pip install -r requirements.txt"));
        assert_eq!(set.get("requirements.txt"), Some(analysis.manifest.as_str()));
    }

    #[test]
    fn readme_lists_missing_files() {
        let files = files(&[("main.py", "import database\n")]);
        let analysis = DependencyAnalyzer::new().analyze_project(&files);
        let set = ArtifactSet::package(&PackageInputs {
            input: "todo app",
            specification: "s",
            plan: "p",
            files: &files,
            analysis: &analysis,
            created_at: fixed_time(),
        })
        .unwrap();
        let readme = set.get("README.md").unwrap();
        assert!(readme.contains("- `database.py`"));
        assert!(!readme.contains("pip install"));
        assert!(!readme.contains("do not parse"));
    }

    #[test]
    fn readme_and_metadata_list_syntax_errors() {
        let files = files(&[("main.py", "import os\ndef run(:\n    pass\n")]);
        let analysis = DependencyAnalyzer::new().analyze_project(&files);
        let set = ArtifactSet::package(&PackageInputs {
            input: "broken tool",
            specification: "s",
            plan: "p",
            files: &files,
            analysis: &analysis,
            created_at: fixed_time(),
        })
        .unwrap();

        let readme = set.get("README.md").unwrap();
        assert!(readme.contains("## Known Issues"));
        assert!(readme.contains("- `main.py` line "));
        assert!(!readme.contains("were not delivered"));

        let meta = ProjectMetadata::describe(RequestId::new(), fixed_time(), &set, &analysis, true);
        assert_eq!(meta.syntax_errors, analysis.syntax_errors);
        assert!(!meta.syntax_errors.is_empty());
    }

    #[test]
    fn metadata_describes_snapshot() {
        let files = files(&[("main.py", "import numpy\n")]);
        let analysis = DependencyAnalyzer::new().analyze_project(&files);
        let created_at = fixed_time();
        let set = ArtifactSet::package(&PackageInputs {
            input: "matrix",
            specification: "s",
            plan: "p",
            files: &files,
            analysis: &analysis,
            created_at,
        })
        .unwrap();
        let meta = ProjectMetadata::describe(RequestId::new(), created_at, &set, &analysis, true);
        assert_eq!(meta.dependencies, vec!["numpy"]);
        assert_eq!(meta.file_count, 5);
        assert_eq!(meta.total_bytes, set.total_bytes());
        assert_eq!(meta.alias_table_version, ALIAS_TABLE_VERSION);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["project_name"], "generated_project_20240309_140507");
    }
}
