//! Implementation output parser
//!
//! Splits the implement phase's accumulated text into [`CodeFiles`]:
//! - `<think>…</think>` blocks are removed first
//! - each fenced block becomes one file; its name comes from the info string
//!   (`python:utils.py`, `python utils.py`, `utils.py`) or a leading
//!   `# file: utils.py` comment
//! - the first unnamed Python block is `main.py`, later ones `module_<n>.py`
//! - an unterminated final fence runs to the end of the text
//! - a `requirements.txt` block is dropped; the manifest is always generated
//! - text without fences that looks like Python becomes `main.py`

use crate::error::ParseError;
use codeflow_deps::{project::is_source_path, CodeFiles, MANIFEST_FILE};
use once_cell::sync::Lazy;
use regex::Regex;

/// Default entry point name
pub const DEFAULT_MAIN_FILE: &str = "main.py";

const FENCE: &str = "```";

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think pattern is valid"));

static FILE_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#\s*(?:file(?:name)?\s*:\s*)?([\w./-]+\.[A-Za-z][A-Za-z0-9]{0,4})\s*$")
        .expect("file comment pattern is valid")
});

static CODE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:import\s+\w|from\s+[\w.]+\s+import\s|def\s+\w+\s*\(|class\s+\w+|if\s+__name__\s*==)")
        .expect("code line pattern is valid")
});

/// Remove model reasoning blocks
#[must_use]
pub fn strip_reasoning(text: &str) -> String {
    THINK_BLOCK
        .replace_all(text, "")
        .replace("</think>", "")
}

#[derive(Debug)]
struct Block<'a> {
    language: Option<String>,
    name: Option<String>,
    lines: Vec<&'a str>,
}

impl Block<'_> {
    fn is_python(&self) -> bool {
        match (&self.name, &self.language) {
            (Some(name), _) => is_source_path(name),
            (None, Some(lang)) => matches!(lang.as_str(), "python" | "py" | "python3"),
            (None, None) => false,
        }
    }
}

/// Parse implementation output into files
///
/// # Errors
/// - [`ParseError::Empty`] when nothing but whitespace or reasoning remains
/// - [`ParseError::NoCode`] when no block or code-like text is found
/// - [`ParseError::NoSourceFile`] when no Python file results
/// - [`ParseError::InvalidPath`] when a block names an unusable path
pub fn parse_implementation(text: &str) -> Result<CodeFiles, ParseError> {
    let cleaned = strip_reasoning(text);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let blocks = split_blocks(trimmed);
    let mut files = CodeFiles::new();
    let mut unnamed_python = 0usize;

    for mut block in blocks {
        if block.name.is_none() {
            block.name = take_file_comment(&mut block.lines);
        }
        let contents = block.lines.join("\n").trim_matches('\n').to_string();
        if contents.trim().is_empty() {
            continue;
        }

        let name = match block.name.take() {
            Some(name) => name,
            None if block.is_python() || untagged_code(&block, &contents) => {
                unnamed_python += 1;
                if unnamed_python == 1 {
                    DEFAULT_MAIN_FILE.to_string()
                } else {
                    format!("module_{unnamed_python}.py")
                }
            }
            None => {
                tracing::debug!(language = ?block.language, "skipping unnamed non-python block");
                continue;
            }
        };

        if name.eq_ignore_ascii_case(MANIFEST_FILE) {
            tracing::debug!("dropping model-supplied manifest");
            continue;
        }
        if files.insert(&name, format!("{contents}\n"))?.is_some() {
            tracing::debug!(file = %name, "later block replaced earlier one");
        }
    }

    if files.is_empty() {
        if CODE_LINE.is_match(trimmed) {
            tracing::debug!("no fenced blocks, using raw text as {}", DEFAULT_MAIN_FILE);
            files.insert(DEFAULT_MAIN_FILE, format!("{trimmed}\n"))?;
        } else {
            return Err(ParseError::NoCode);
        }
    }

    if files.source_files().next().is_none() {
        return Err(ParseError::NoSourceFile);
    }

    tracing::info!(files = files.len(), bytes = files.total_bytes(), "parsed implementation output");
    Ok(files)
}

/// Untagged fences count as Python when they contain Python statements
fn untagged_code(block: &Block<'_>, contents: &str) -> bool {
    block.language.is_none() && CODE_LINE.is_match(contents)
}

fn split_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block<'_>> = None;

    for line in text.lines() {
        let stripped = line.trim();
        match current.take() {
            None => {
                if let Some(info) = stripped.strip_prefix(FENCE) {
                    let (language, name) = parse_info(info);
                    current = Some(Block {
                        language,
                        name,
                        lines: Vec::new(),
                    });
                }
            }
            Some(block) if stripped == FENCE => blocks.push(block),
            Some(mut block) => {
                block.lines.push(line);
                current = Some(block);
            }
        }
    }

    // Truncated output: the open block runs to the end
    blocks.extend(current);
    blocks
}

/// Split a fence info string into language and file name
fn parse_info(info: &str) -> (Option<String>, Option<String>) {
    let info = info.trim().trim_start_matches('`');
    if info.is_empty() {
        return (None, None);
    }

    let (head, tail) = match info.find(|c: char| c == ':' || c.is_whitespace()) {
        Some(idx) => (&info[..idx], info[idx + 1..].trim()),
        None => (info, ""),
    };

    let tail = tail
        .strip_prefix("title=")
        .unwrap_or(tail)
        .trim_matches(|c| c == '"' || c == '\'');

    if tail.is_empty() {
        if looks_like_file_name(head) {
            return (None, Some(head.to_string()));
        }
        return (Some(head.to_lowercase()), None);
    }

    let name = looks_like_file_name(tail).then(|| tail.to_string());
    (Some(head.to_lowercase()), name)
}

fn looks_like_file_name(s: &str) -> bool {
    s.rsplit_once('.').is_some_and(|(stem, ext)| {
        !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
    }) && !s.contains(char::is_whitespace)
}

fn take_file_comment(lines: &mut Vec<&str>) -> Option<String> {
    let idx = lines.iter().position(|l| !l.trim().is_empty())?;
    let caps = FILE_COMMENT.captures(lines[idx].trim())?;
    let name = caps.get(1)?.as_str().to_string();
    lines.remove(idx);
    Some(name)
}
