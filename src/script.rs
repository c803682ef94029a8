//! The game's `user.script.txt` load-order script.
//!
//! Only lines of the exact form `mod "<name>";` are understood. Everything
//! else in the file belongs to the game or the user and is carried through a
//! rewrite untouched.

use crate::{fsio, standard::StandardRegistry};
use anyhow::{Context, Result};
use std::{fs, path::Path};

const DECL_PREFIX: &str = "mod \"";
const DECL_SUFFIX: &str = "\";";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLine<'a> {
    Declaration(&'a str),
    Foreign,
}

/// Classifies one raw line. Never fails: anything that is not a well-formed
/// declaration is foreign.
pub fn classify(line: &str) -> ScriptLine<'_> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix(DECL_PREFIX) else {
        return ScriptLine::Foreign;
    };
    let Some(id) = rest.strip_suffix(DECL_SUFFIX) else {
        return ScriptLine::Foreign;
    };
    if id.is_empty() || id.contains('"') {
        return ScriptLine::Foreign;
    }
    ScriptLine::Declaration(id)
}

pub fn declaration(id: &str) -> String {
    format!("{DECL_PREFIX}{id}{DECL_SUFFIX}")
}

/// Whether `id` survives a write as a single declaration line that reads
/// back as the same id. Ids failing this could never be removed again.
pub fn is_declarable(id: &str) -> bool {
    if id.contains(['\n', '\r']) {
        return false;
    }
    classify(&declaration(id)) == ScriptLine::Declaration(id)
}

/// Manager-owned identifiers declared in the script, in file order.
pub fn declared_mods(lines: &[String], registry: &StandardRegistry) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| match classify(line) {
            ScriptLine::Declaration(id) if !registry.contains(id) => Some(id.to_string()),
            _ => None,
        })
        .collect()
}

/// Rebuilds the script for `active_order`.
///
/// Foreign lines and declarations of standard packages stay where they were;
/// every other declaration is dropped and the active order is appended after
/// the retained lines.
pub fn reconcile<S: AsRef<str>>(
    existing: &[String],
    active_order: &[S],
    registry: &StandardRegistry,
) -> Vec<String> {
    let mut lines: Vec<String> = existing
        .iter()
        .filter(|line| match classify(line) {
            ScriptLine::Declaration(id) => registry.contains(id),
            ScriptLine::Foreign => true,
        })
        .cloned()
        .collect();

    let retained = lines.len();
    for id in active_order {
        let line = declaration(id.as_ref());
        if lines[..retained].contains(&line) {
            continue;
        }
        lines.push(line);
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }

    fn detect(raw: &str) -> Self {
        if raw.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptFile {
    pub lines: Vec<String>,
    pub line_ending: LineEnding,
}

impl ScriptFile {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        Self {
            lines: raw.lines().map(str::to_string).collect(),
            line_ending: LineEnding::detect(raw),
        }
    }

    pub fn render(&self) -> String {
        let ending = self.line_ending.as_str();
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push_str(ending);
        }
        out
    }

    pub fn with_lines(&self, lines: Vec<String>) -> Self {
        Self {
            lines,
            line_ending: self.line_ending,
        }
    }
}

/// Missing script reads as empty.
pub fn read_script(path: &Path) -> Result<ScriptFile> {
    if !path.exists() {
        return Ok(ScriptFile::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read load-order script {}", path.display()))?;
    Ok(ScriptFile::parse(&raw))
}

pub fn write_script(path: &Path, script: &ScriptFile) -> Result<()> {
    fsio::write_atomic_text(path, &script.render()).context("write load-order script")
}
