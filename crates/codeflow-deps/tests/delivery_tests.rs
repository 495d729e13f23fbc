use codeflow_deps::{
    find_missing_local_files, CodeFiles, ComplianceChecker, DependencyAnalyzer, DependencyKind,
    ImportClass, ImportClassifier, Manifest, ViolationReason,
};
use codeflow_test_utils::project;
use proptest::prelude::*;

const STDLIB_SAMPLE: &[&str] = &[
    "os", "sys", "json", "math", "datetime", "random", "re", "time", "typing", "pathlib",
    "collections", "itertools", "functools", "subprocess", "threading", "asyncio", "logging",
];

const THIRD_PARTY_SAMPLE: &[&str] = &[
    "PIL", "cv2", "sklearn", "yaml", "numpy", "pandas", "matplotlib", "fastapi", "pygame",
    "plotly", "seaborn", "requests", "flask", "bs4", "dotenv",
];

const LOCAL_SAMPLE: &[&str] = &["database", "models", "config", "helpers", "routes", "engine"];

fn manifest_packages(manifest: &str) -> Vec<String> {
    Manifest::parse(manifest).declared().map(str::to_string).collect()
}

#[test]
fn test_documented_aliases() {
    let classifier = ImportClassifier::new();
    let cases = [
        ("PIL", "pillow"),
        ("cv2", "opencv-python"),
        ("sklearn", "scikit-learn"),
        ("yaml", "pyyaml"),
        ("numpy", "numpy"),
        ("pandas", "pandas"),
        ("matplotlib", "matplotlib"),
        ("fastapi", "fastapi"),
        ("pygame", "pygame"),
        ("plotly", "plotly"),
        ("seaborn", "seaborn"),
    ];
    for (import, package) in cases {
        assert_eq!(
            classifier.classify(import),
            ImportClass::ThirdParty(package.to_string()),
            "{import}"
        );
    }
}

#[test]
fn test_self_containment_example() {
    let files = project(&[
        (
            "main.py",
            "import database\nimport models\nimport config\nimport utils\n\nutils.run()\n",
        ),
        ("utils.py", "def run():\n    print('ok')\n"),
    ]);
    assert_eq!(
        find_missing_local_files(&files),
        vec!["database.py", "models.py", "config.py"]
    );
}

#[test]
fn test_compliance_cases() {
    let checker = ComplianceChecker::new();

    let stdlib_only = project(&[("main.py", "import os\nimport math\n")]);
    assert!(checker.check(&stdlib_only, "").compliant());

    let declared = project(&[("main.py", "import pygame\n")]);
    assert!(checker.check(&declared, "# Requirements\npygame\n").compliant());

    let broken = project(&[("main.py", "import database\nimport pandas\n")]);
    let verdict = checker.check(&broken, "flask\n");
    assert!(!verdict.compliant());
    assert_eq!(verdict.violation_count(), 2);
    assert_eq!(verdict.violations()[0].reason, ViolationReason::UnresolvedLocalImport);
    assert_eq!(verdict.violations()[1].reason, ViolationReason::MissingManifestEntry);
}

#[test]
fn test_generated_manifest_satisfies_compliance() {
    let files = project(&[
        (
            "main.py",
            "import pygame\nfrom game import Game\nimport numpy as np\nfrom PIL import Image\n",
        ),
        ("game.py", "import random\nimport cv2\n\nclass Game:\n    pass\n"),
    ]);
    let (_, manifest) = DependencyAnalyzer::new().analyze(&files);
    assert_eq!(
        manifest_packages(&manifest),
        vec!["numpy", "opencv-python", "pillow", "pygame"]
    );
    assert!(ComplianceChecker::new().check(&files, &manifest).compliant());
}

#[test]
fn test_nested_package_end_to_end() {
    let files = project(&[
        ("main.py", "from pkg import a\n"),
        ("pkg/__init__.py", ""),
        ("pkg/a.py", "from . import b\nfrom .c import thing\nimport pygame\n"),
        ("pkg/b.py", ""),
        ("pkg/c.py", "thing = 1\n"),
    ]);
    let analysis = DependencyAnalyzer::new().analyze_project(&files);
    assert!(analysis.missing_local_files.is_empty());
    assert_eq!(manifest_packages(&analysis.manifest), vec!["pygame"]);
    assert!(ComplianceChecker::new().check(&files, &analysis.manifest).compliant());

    let misplaced = project(&[("models.py", ""), ("pkg/app.py", "from .models import X\n")]);
    assert_eq!(find_missing_local_files(&misplaced), vec!["pkg/models.py"]);
    assert!(!ComplianceChecker::new().check(&misplaced, "").compliant());
}

#[test]
fn test_truncated_source_keeps_later_imports() {
    let files = project(&[("main.py", "x = [1, 2\nimport requests\n")]);
    let analysis = DependencyAnalyzer::new().analyze_project(&files);
    assert_eq!(manifest_packages(&analysis.manifest), vec!["requests"]);
    assert_eq!(analysis.syntax_errors[0].file, "main.py");
    assert!(!ComplianceChecker::new().check(&files, "").compliant());
    assert!(ComplianceChecker::new().check(&files, &analysis.manifest).compliant());
}

#[test]
fn test_local_shadowing_end_to_end() {
    let files = project(&[
        ("main.py", "import config\nimport yaml\n"),
        ("config.py", "DEBUG = True\n"),
        ("yaml.py", "def load(text):\n    return {}\n"),
    ]);
    let (records, manifest) = DependencyAnalyzer::new().analyze(&files);
    assert!(records.iter().all(|r| r.kind == DependencyKind::Local));
    assert!(manifest_packages(&manifest).is_empty());
    assert!(ComplianceChecker::new().check(&files, &manifest).compliant());
}

fn arb_project() -> impl Strategy<Value = CodeFiles> {
    let ident = prop_oneof![
        proptest::sample::select(STDLIB_SAMPLE),
        proptest::sample::select(THIRD_PARTY_SAMPLE),
        proptest::sample::select(LOCAL_SAMPLE),
    ];
    let file = proptest::collection::vec((ident, any::<bool>()), 0..8);
    proptest::collection::vec(file, 1..4).prop_map(|files| {
        let mut project = CodeFiles::new();
        for (idx, imports) in files.into_iter().enumerate() {
            let source: String = imports
                .into_iter()
                .map(|(name, from_form)| {
                    if from_form {
                        format!("from {name} import thing\n")
                    } else {
                        format!("import {name}\n")
                    }
                })
                .collect();
            project.insert(format!("file_{idx}.py"), source).unwrap();
        }
        project
    })
}

proptest! {
    #[test]
    fn prop_analysis_is_idempotent(files in arb_project()) {
        let analyzer = DependencyAnalyzer::new();
        prop_assert_eq!(analyzer.analyze(&files), analyzer.analyze(&files));
    }

    #[test]
    fn prop_stdlib_never_in_manifest(files in arb_project()) {
        let (records, manifest) = DependencyAnalyzer::new().analyze(&files);
        let declared = manifest_packages(&manifest);
        for name in STDLIB_SAMPLE {
            prop_assert!(!declared.iter().any(|d| d == name));
        }
        for record in records.iter().filter(|r| r.kind == DependencyKind::Stdlib) {
            prop_assert!(record.package.is_none());
        }
    }

    #[test]
    fn prop_one_record_per_identifier(files in arb_project()) {
        let (records, _) = DependencyAnalyzer::new().analyze(&files);
        let mut ids: Vec<_> = records.iter().map(|r| r.identifier.clone()).collect();
        let before = ids.len();
        ids.dedup();
        prop_assert_eq!(before, ids.len());
    }

    #[test]
    fn prop_verdict_flag_matches_violations(files in arb_project(), declare_all in any::<bool>()) {
        let manifest = if declare_all {
            DependencyAnalyzer::new().analyze(&files).1
        } else {
            String::new()
        };
        let verdict = ComplianceChecker::new().check(&files, &manifest);
        prop_assert_eq!(verdict.compliant(), verdict.violations().is_empty());
    }

    #[test]
    fn prop_generated_manifest_leaves_only_local_violations(files in arb_project()) {
        let (_, manifest) = DependencyAnalyzer::new().analyze(&files);
        let verdict = ComplianceChecker::new().check(&files, &manifest);
        let missing = find_missing_local_files(&files);
        for v in verdict.violations() {
            prop_assert_eq!(v.reason, ViolationReason::UnresolvedLocalImport);
            let expected = format!("{}.py", v.identifier);
            prop_assert!(missing.contains(&expected));
        }
    }
}
