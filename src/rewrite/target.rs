// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Rewrite target resolution.
//!
//! Operator picks exactly one action per invocation. The resolver turns the
//! raw flag values into a validated [`Action`] before anything touches the
//! repository.

use crate::{config::Settings, pattern::PathPattern};

use glob::Pattern;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Component, Path, PathBuf},
};

/// What to remove or replace in history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteTarget {
    /// One exact path.
    File(PathBuf),

    /// Path prefix and everything beneath it.
    Directory(PathBuf),

    /// Shell glob whose `*` may cross `/`.
    PatternGlob(Pattern),

    /// Literal token replaced in every blob.
    LiteralString(String),

    /// Reserved regular expression mode.
    Regex(String),

    /// Batch of AI-assistant artifact patterns.
    AiArtifactSet(Vec<PathPattern>),
}

impl RewriteTarget {
    /// Short name of target kind for messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Directory(_) => "directory",
            Self::PatternGlob(_) => "pattern",
            Self::LiteralString(_) => "string",
            Self::Regex(_) => "regex",
            Self::AiArtifactSet(_) => "ai artifacts",
        }
    }

    /// Target removes paths rather than replacing content.
    pub fn is_path_based(&self) -> bool {
        !matches!(self, Self::LiteralString(_) | Self::Regex(_))
    }

    /// Match historical path against target.
    ///
    /// Content targets never match a path.
    pub fn matches_path(&self, path: &Path) -> bool {
        match self {
            Self::File(file) => path == file,
            Self::Directory(dir) => path != dir && path.starts_with(dir),
            Self::PatternGlob(glob) => glob.matches_path(path),
            Self::AiArtifactSet(patterns) => patterns.iter().any(|pattern| pattern.matches(path)),
            Self::LiteralString(_) | Self::Regex(_) => false,
        }
    }
}

impl Display for RewriteTarget {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::File(file) => write!(fmt, "file {:?}", file.display()),
            Self::Directory(dir) => write!(fmt, "directory {:?}", dir.display()),
            Self::PatternGlob(glob) => write!(fmt, "pattern {:?}", glob.as_str()),
            // INVARIANT: Never echo the literal, it is usually a secret.
            Self::LiteralString(literal) => write!(fmt, "string of {} chars", literal.chars().count()),
            Self::Regex(regex) => write!(fmt, "regex {regex:?}"),
            Self::AiArtifactSet(patterns) => write!(fmt, "{} ai artifact patterns", patterns.len()),
        }
    }
}

/// Resolved action of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Rewrite history against target.
    Rewrite(RewriteTarget),

    /// Read-only scan of sensitive and AI-assistant paths.
    List,

    /// Take backup and stop.
    BackupOnly,
}

/// Raw action flags as given on the command line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActionFlags {
    pub file: Option<PathBuf>,
    pub directory: Option<PathBuf>,
    pub pattern: Option<String>,
    pub string: Option<String>,
    pub regex: Option<String>,
    pub list: bool,
    pub backup: bool,
    pub ai: bool,
}

impl ActionFlags {
    fn given(&self) -> Vec<&'static str> {
        let mut given = Vec::new();
        if self.file.is_some() {
            given.push("--file");
        }
        if self.directory.is_some() {
            given.push("--directory");
        }
        if self.pattern.is_some() {
            given.push("--pattern");
        }
        if self.string.is_some() {
            given.push("--string");
        }
        if self.regex.is_some() {
            given.push("--regex");
        }
        if self.list {
            given.push("--list");
        }
        if self.ai {
            given.push("--ai");
        }

        given
    }
}

/// Resolve action flags into exactly one action.
///
/// `--backup` alone means backup only. Next to any other action it is
/// redundant, since every rewrite takes a backup anyway.
///
/// # Errors
///
/// - Return [`InvalidArgument`] if no action, more than one action, or an
///   unusable value was given.
pub fn resolve(flags: ActionFlags, settings: &Settings) -> Result<Action> {
    let given = flags.given();
    match given.len() {
        0 if flags.backup => return Ok(Action::BackupOnly),
        0 => return Err(InvalidArgument::NoAction),
        1 => {}
        _ => return Err(InvalidArgument::Conflicting(given.join(", "))),
    }

    if flags.list {
        return Ok(Action::List);
    }

    let target = if let Some(file) = flags.file {
        RewriteTarget::File(relative_path("--file", file)?)
    } else if let Some(dir) = flags.directory {
        RewriteTarget::Directory(relative_path("--directory", dir)?)
    } else if let Some(pattern) = flags.pattern {
        non_empty("--pattern", &pattern)?;
        RewriteTarget::PatternGlob(
            Pattern::new(&pattern).map_err(|source| InvalidArgument::Glob { source, pattern })?,
        )
    } else if let Some(literal) = flags.string {
        non_empty("--string", &literal)?;
        if literal.contains(['\n', '\r']) {
            return Err(InvalidArgument::Multiline);
        }
        RewriteTarget::LiteralString(literal)
    } else if let Some(regex) = flags.regex {
        non_empty("--regex", &regex)?;
        RewriteTarget::Regex(regex)
    } else {
        if settings.ai_patterns.is_empty() {
            return Err(InvalidArgument::EmptyArtifactSet);
        }
        RewriteTarget::AiArtifactSet(settings.ai_patterns.clone())
    };

    Ok(Action::Rewrite(target))
}

fn non_empty(flag: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(InvalidArgument::Empty { flag });
    }

    Ok(())
}

// INVARIANT: History paths are repository-relative without `.` or trailing `/`.
fn relative_path(flag: &'static str, path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Err(InvalidArgument::Absolute { flag, path });
    }

    let mut normal = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normal.push(part),
            Component::CurDir => continue,
            _ => return Err(InvalidArgument::Escapes { flag, path }),
        }
    }

    if normal.as_os_str().is_empty() {
        return Err(InvalidArgument::Empty { flag });
    }

    Ok(normal)
}

/// Invalid argument error types.
#[derive(Debug, thiserror::Error)]
pub enum InvalidArgument {
    /// No action flag was given.
    #[error("no action given, pick one of --file, --directory, --pattern, --string, --list, --backup, --ai")]
    NoAction,

    /// More than one action flag was given.
    #[error("only one action allowed per run, got {0}")]
    Conflicting(String),

    /// Flag value is empty.
    #[error("{flag} needs a non-empty value")]
    Empty { flag: &'static str },

    /// Path is absolute instead of repository-relative.
    #[error("{flag} expects a repository-relative path, got {:?}", path.display())]
    Absolute { flag: &'static str, path: PathBuf },

    /// Path climbs out of repository.
    #[error("{flag} path {:?} points outside of repository", path.display())]
    Escapes { flag: &'static str, path: PathBuf },

    /// Glob pattern cannot be parsed.
    #[error("invalid glob pattern {pattern:?}")]
    Glob {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },

    /// Literal spans multiple lines.
    #[error("--string cannot contain line breaks")]
    Multiline,

    /// AI-assistant artifact list was configured empty.
    #[error("no ai artifact patterns configured")]
    EmptyArtifactSet,

    /// Mode exists on the command line but has no implementation.
    #[error("{flag} is not implemented")]
    Unimplemented { flag: &'static str },
}

/// Friendly result alias :3
type Result<T, E = InvalidArgument> = std::result::Result<T, E>;
