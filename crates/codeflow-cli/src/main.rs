use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use codeflow_core::{
    ArtifactStore, CodeflowConfig, CompliancePolicy, DirectoryStore, GenerationEvent, InMemoryArtifactStore,
    Orchestrator, ScriptedGenerator, Transcript,
};
use codeflow_deps::project::is_source_path;
use codeflow_deps::{
    AnalyzerOptions, CodeFiles, ComplianceChecker, ComplianceVerdict, DependencyAnalyzer, SyntaxIssue,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directories never scanned for sources
const SKIPPED_DIRS: &[&str] = &["__pycache__", "venv", "env", "node_modules", "build", "dist"];

fn cli() -> Command {
    Command::new("codeflow")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Hermetic delivery checks for generated Python projects")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Analyze a directory of .py files and check it against a manifest")
                .arg(
                    Arg::new("dir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Project directory"),
                )
                .arg(
                    Arg::new("manifest")
                        .long("manifest")
                        .value_parser(value_parser!(PathBuf))
                        .help("Check against this requirements file instead of the generated one"),
                )
                .arg(
                    Arg::new("pin-versions")
                        .long("pin-versions")
                        .action(ArgAction::SetTrue)
                        .help("Write recommended lower bounds into the generated manifest"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("replay")
                .about("Drive the orchestrator with a recorded JSON transcript")
                .arg(
                    Arg::new("transcript")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Transcript file"),
                )
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .help("User request text"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("enforce")
                        .long("enforce")
                        .action(ArgAction::SetTrue)
                        .help("Fail the run when the delivery is not self-contained"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write delivered projects under this directory"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print events as JSON lines"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let result = match matches.subcommand() {
        Some(("analyze", args)) => analyze(args),
        Some(("replay", args)) => replay(args).await,
        Some((other, _)) => Err(anyhow::anyhow!("unknown command {other}")),
        None => Err(anyhow::anyhow!("no command given")),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(2);
        }
    }
}

fn analyze(args: &ArgMatches) -> Result<i32> {
    let dir = args.get_one::<PathBuf>("dir").context("missing project directory")?;
    let files = load_project(dir)?;
    if files.is_empty() {
        bail!("no python files under {}", dir.display());
    }

    let options = AnalyzerOptions {
        pin_versions: args.get_flag("pin-versions"),
        annotate_missing: true,
    };
    let analysis = DependencyAnalyzer::new().with_options(options).analyze_project(&files);

    let (manifest_source, manifest) = match args.get_one::<PathBuf>("manifest") {
        Some(path) => (
            path.display().to_string(),
            std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?,
        ),
        None => ("generated".to_string(), analysis.manifest.clone()),
    };
    let verdict = ComplianceChecker::new().check(&files, &manifest);

    if args.get_flag("json") {
        let report = serde_json::json!({
            "files": files.paths().collect::<Vec<_>>(),
            "analysis": analysis,
            "manifest_source": manifest_source,
            "verdict": verdict,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Files: {}", files.len());
        println!();
        println!("Dependencies:");
        for record in &analysis.records {
            match &record.package {
                Some(package) if package != &record.identifier => {
                    println!("  {:<24} {} -> {package}", record.identifier, record.kind);
                }
                _ => println!("  {:<24} {}", record.identifier, record.kind),
            }
        }
        if !analysis.missing_local_files.is_empty() {
            println!();
            println!("Missing local files:");
            for path in &analysis.missing_local_files {
                println!("  - {path}");
            }
        }
        if !analysis.syntax_errors.is_empty() {
            println!();
            println!("Syntax errors:");
            for line in syntax_lines(&analysis.syntax_errors) {
                println!("  - {line}");
            }
        }
        if !analysis.advisories.is_empty() {
            println!();
            println!("Advisories:");
            for advisory in &analysis.advisories {
                println!("  - [{}] {}", advisory.code, advisory.message);
            }
        }
        println!();
        println!("Generated manifest:");
        print!("{}", analysis.manifest);
        println!();
        print_verdict(&format!("Compliance ({manifest_source})"), &verdict);
    }

    Ok(i32::from(!verdict.compliant()))
}

async fn replay(args: &ArgMatches) -> Result<i32> {
    let path = args.get_one::<PathBuf>("transcript").context("missing transcript")?;
    let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let transcript = Transcript::from_json(&text).with_context(|| format!("invalid transcript {}", path.display()))?;
    let input = args.get_one::<String>("input").context("missing input")?;

    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => CodeflowConfig::from_file(path)?,
        None => CodeflowConfig::default(),
    };
    if args.get_flag("enforce") {
        config = config.with_compliance_policy(CompliancePolicy::Enforce);
    }

    let store: Arc<dyn ArtifactStore> = match args.get_one::<PathBuf>("out") {
        Some(dir) => Arc::new(DirectoryStore::new(dir)),
        None => Arc::new(InMemoryArtifactStore::new()),
    };
    let orchestrator = Orchestrator::new(config, Arc::new(ScriptedGenerator::new(transcript)), store)?;

    let mut handle = orchestrator.start(input)?;
    let json = args.get_flag("json");
    let mut failed = false;
    while let Some(event) = handle.next_event().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event);
        }
        failed = matches!(event, GenerationEvent::Error(_));
    }

    Ok(i32::from(failed))
}

/// One line per parse error, in file order
fn syntax_lines(issues: &[SyntaxIssue]) -> Vec<String> {
    issues.iter().map(ToString::to_string).collect()
}

fn print_event(event: &GenerationEvent) {
    match event {
        GenerationEvent::PhaseStart { phase, description } => println!("==> {phase}: {description}"),
        GenerationEvent::EducationalMessage { message, .. } => println!("    {message}"),
        GenerationEvent::Thinking { packets, .. } => {
            for packet in packets {
                println!("    (thinking) {}", packet.content);
            }
        }
        GenerationEvent::Text { content, .. } => print!("{content}"),
        GenerationEvent::PhaseComplete { phase, content_length } => {
            println!();
            println!("<== {phase} complete ({content_length} chars)");
        }
        GenerationEvent::Completion(summary) => {
            println!();
            println!("Delivered {} ({} files, run {})", summary.project_name, summary.files.len(), summary.main_file);
            if !summary.dependencies.is_empty() {
                println!("  dependencies: {}", summary.dependencies.join(", "));
            }
            if !summary.missing_local_files.is_empty() {
                println!("  missing local files: {}", summary.missing_local_files.join(", "));
            }
            for line in syntax_lines(&summary.syntax_errors) {
                println!("  syntax error: {line}");
            }
            for advisory in &summary.advisories {
                println!("  advisory [{}]: {}", advisory.code, advisory.message);
            }
            print_verdict("  compliance", &summary.verdict);
            if !summary.persisted {
                println!("  warning: artifacts were not persisted");
            }
        }
        GenerationEvent::Error(report) => {
            println!();
            println!("Failed [{}]: {}", report.kind, report.message);
            if let Some(verdict) = &report.verdict {
                print_verdict("  compliance", verdict);
            }
        }
    }
}

fn print_verdict(label: &str, verdict: &ComplianceVerdict) {
    if verdict.compliant() {
        println!("{label}: OK");
        return;
    }
    println!("{label}: {} violation(s)", verdict.violation_count());
    for violation in verdict.violations() {
        println!("    {violation}");
    }
}

/// Collect `.py` files under `root`, keyed by `/`-separated relative path
fn load_project(root: &Path) -> Result<CodeFiles> {
    let mut files = CodeFiles::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = std::fs::read_dir(&dir)
            .with_context(|| format!("cannot read {}", dir.display()))?
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(std::fs::DirEntry::file_name);

        for entry in entries {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if !SKIPPED_DIRS.contains(&&*name) {
                    pending.push(path);
                }
            } else if file_type.is_file() && is_source_path(&name) {
                let relative = path.strip_prefix(root)?.to_string_lossy().replace('\\', "/");
                let contents =
                    std::fs::read_to_string(&path).with_context(|| format!("cannot read {}", path.display()))?;
                files.insert(relative, contents)?;
            }
        }
    }

    tracing::info!(root = %root.display(), files = files.len(), "loaded project");
    Ok(files)
}
