// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External history rewriting.
//!
//! Spillway does not rewrite commits itself. It translates a
//! [`FilterInstruction`] into one invocation of
//! [git-filter-repo](https://github.com/newren/git-filter-repo), which is
//! assumed to be atomic: either every ref gets rewritten, or the tool fails
//! and the working copy is left for manual inspection.
//!
//! Text and message replacement read their rules from a file. That file is a
//! temporary file that only lives for the duration of the invocation.

use crate::{
    rewrite::precondition::{require_tool, PreconditionError},
    syscall::{syscall_interactive, SyscallError},
};

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{info, instrument};

/// One replacement rule in git-filter-repo's expression syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceRule {
    /// Replace literal text.
    Literal { from: String, to: String },

    /// Replace Python regular expression match.
    Regex { pattern: String, to: String },
}

impl Display for ReplaceRule {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Literal { from, to } => write!(fmt, "literal:{from}==>{to}"),
            Self::Regex { pattern, to } => write!(fmt, "regex:{pattern}==>{to}"),
        }
    }
}

/// What a single history rewrite should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterInstruction {
    /// Drop exact paths from history. Directory paths end in `/`.
    ExcludePaths(Vec<String>),

    /// Drop every path matching glob from history.
    ExcludeGlob(String),

    /// Replace text in every blob.
    ReplaceText(Vec<ReplaceRule>),

    /// Replace text in commit messages of target refs only.
    ReplaceMessage { refs: String, rules: Vec<ReplaceRule> },
}

impl FilterInstruction {
    fn rules(&self) -> Option<&[ReplaceRule]> {
        match self {
            Self::ReplaceText(rules) | Self::ReplaceMessage { rules, .. } => Some(rules.as_slice()),
            _ => None,
        }
    }
}

/// Rewrite history of repository.
pub trait HistoryFilter {
    /// Check that rewriting is possible at all.
    ///
    /// # Errors
    ///
    /// - Return [`PreconditionError::MissingTool`] if rewrite tool is absent.
    fn ensure_available(&self) -> Result<(), PreconditionError>;

    /// Rewrite history of repository at `repo` according to instruction.
    ///
    /// # Errors
    ///
    /// - Return [`FilterError`] if rewrite fails.
    fn run(&self, repo: &Path, instruction: &FilterInstruction) -> Result<()>;
}

/// History rewriting through git-filter-repo.
#[derive(Debug, Clone)]
pub struct FilterRepo {
    program: PathBuf,
}

impl FilterRepo {
    /// Name of rewrite tool binary.
    pub const TOOL: &'static str = "git-filter-repo";

    /// Construct new filter that runs target program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Construct filter from tool found on `PATH`.
    ///
    /// # Errors
    ///
    /// - Return [`PreconditionError::MissingTool`] if tool is absent.
    pub fn locate() -> Result<Self, PreconditionError> {
        require_tool(Self::TOOL).map(Self::new)
    }
}

impl Default for FilterRepo {
    fn default() -> Self {
        Self::new(Self::TOOL)
    }
}

impl HistoryFilter for FilterRepo {
    fn ensure_available(&self) -> Result<(), PreconditionError> {
        require_tool(self.program.to_string_lossy().as_ref()).map(|_| ())
    }

    #[instrument(skip(self, repo, instruction), level = "debug")]
    fn run(&self, repo: &Path, instruction: &FilterInstruction) -> Result<()> {
        // INVARIANT: Rule file must outlive the invocation, and no longer.
        let rules_file = match instruction.rules() {
            Some(rules) => Some(write_rules(rules)?),
            None => None,
        };

        let args = filter_args(instruction, rules_file.as_ref().map(NamedTempFile::path));
        info!("rewrite history of {:?}", repo.display());
        syscall_interactive(&self.program, Some(repo), args)?;

        Ok(())
    }
}

/// Translate instruction into git-filter-repo arguments.
pub fn filter_args(instruction: &FilterInstruction, rules_file: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--force".into()];
    match instruction {
        FilterInstruction::ExcludePaths(paths) => {
            args.push("--invert-paths".into());
            for path in paths {
                args.push("--path".into());
                args.push(path.into());
            }
        }
        FilterInstruction::ExcludeGlob(glob) => {
            args.push("--invert-paths".into());
            args.push("--path-glob".into());
            args.push(glob.into());
        }
        FilterInstruction::ReplaceText(_) => {
            args.push("--replace-text".into());
            args.extend(rules_file.map(|path| path.as_os_str().to_owned()));
        }
        FilterInstruction::ReplaceMessage { refs, .. } => {
            args.push("--refs".into());
            args.push(refs.into());
            args.push("--replace-message".into());
            args.extend(rules_file.map(|path| path.as_os_str().to_owned()));
        }
    }

    args
}

fn write_rules(rules: &[ReplaceRule]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("spillway-rules-")
        .suffix(".txt")
        .tempfile()
        .map_err(FilterError::RulesFile)?;
    for rule in rules {
        writeln!(file, "{rule}").map_err(FilterError::RulesFile)?;
    }
    file.flush().map_err(FilterError::RulesFile)?;

    Ok(file)
}

/// History rewrite error types.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// Temporary rule file cannot be written.
    #[error("failed to write temporary replacement rules")]
    RulesFile(#[source] std::io::Error),

    /// Rewrite tool fails.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = FilterError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn exclude_paths_inverts_each_path() {
        let args = filter_args(
            &FilterInstruction::ExcludePaths(vec!["secret.env".into(), "build/".into()]),
            None,
        );
        assert_eq!(
            strings(args),
            ["--force", "--invert-paths", "--path", "secret.env", "--path", "build/"]
        );
    }

    #[test]
    fn exclude_glob_uses_path_glob() {
        let args = filter_args(&FilterInstruction::ExcludeGlob("*.log".into()), None);
        assert_eq!(
            strings(args),
            ["--force", "--invert-paths", "--path-glob", "*.log"]
        );
    }

    #[test]
    fn replace_text_points_at_rules_file() {
        let args = filter_args(
            &FilterInstruction::ReplaceText(vec![]),
            Some(Path::new("/tmp/rules.txt")),
        );
        assert_eq!(strings(args), ["--force", "--replace-text", "/tmp/rules.txt"]);
    }

    #[test]
    fn replace_message_limits_refs() {
        let args = filter_args(
            &FilterInstruction::ReplaceMessage {
                refs: "feature-x".into(),
                rules: vec![],
            },
            Some(Path::new("/tmp/rules.txt")),
        );
        assert_eq!(
            strings(args),
            [
                "--force",
                "--refs",
                "feature-x",
                "--replace-message",
                "/tmp/rules.txt"
            ]
        );
    }

    #[test]
    fn rules_render_in_filter_repo_syntax() {
        let literal = ReplaceRule::Literal {
            from: "hunter2".into(),
            to: "***REMOVED***".into(),
        };
        let regex = ReplaceRule::Regex {
            pattern: "(?im)^co-authored-by:.*$".into(),
            to: String::new(),
        };
        assert_eq!(literal.to_string(), "literal:hunter2==>***REMOVED***");
        assert_eq!(regex.to_string(), "regex:(?im)^co-authored-by:.*$==>");
    }

    #[test]
    fn rules_file_is_removed_after_use() -> anyhow::Result<()> {
        let file = write_rules(&[ReplaceRule::Literal {
            from: "a".into(),
            to: "b".into(),
        }])?;
        let path = file.path().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path)?, "literal:a==>b\n");

        drop(file);
        assert!(!path.exists());
        Ok(())
    }
}
