// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Temporary clone that the reindex works in.
//!
//! The clone lives in a [`TempDir`] owned by [`TempClone`], so it is removed
//! when the clone goes out of scope. That covers success, early return, and
//! every propagated error alike.

use crate::{
    rewrite::filter::{FilterError, FilterInstruction, FilterRepo, HistoryFilter, ReplaceRule},
    syscall::{syscall_non_interactive, SyscallError},
};

use std::{ffi::OsStr, path::Path};
use tempfile::TempDir;
use tracing::{debug, info, instrument};

/// Local operations of the reindex.
pub trait Workspace {
    /// Check out branch, tracking remote branch of same name.
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Strip attribution lines mentioning marker from commit messages of
    /// branch.
    fn strip_attribution(&self, branch: &str, marker: &str) -> Result<()>;

    /// Force-push branch to origin.
    fn force_push(&self, branch: &str) -> Result<()>;

    /// Create branch without ancestry holding one empty commit.
    fn create_orphan(&self, branch: &str, message: &str) -> Result<()>;
}

/// Commit message rules that strip attribution to an identity.
///
/// Removes `Co-Authored-By:` trailers and "generated with" footers whose line
/// mentions marker, ignoring case.
pub fn attribution_rules(marker: &str) -> Vec<ReplaceRule> {
    let marker = regex::escape(marker);
    vec![
        ReplaceRule::Regex {
            pattern: format!(r"(?im)^[ \t]*co-authored-by:[^\n]*{marker}[^\n]*\n?"),
            to: String::new(),
        },
        ReplaceRule::Regex {
            pattern: format!(r"(?im)^[^\n]*generated with[^\n]*{marker}[^\n]*\n?"),
            to: String::new(),
        },
    ]
}

/// Fresh clone in a temporary directory.
pub struct TempClone<F = FilterRepo>
where
    F: HistoryFilter,
{
    dir: TempDir,
    url: String,
    filter: F,
}

impl<F> TempClone<F>
where
    F: HistoryFilter,
{
    /// Clone repository at URL into new temporary directory.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::TempDir`] if directory cannot be created.
    /// - Return [`WorkspaceError::Git`] if clone fails.
    #[instrument(skip(url, filter), level = "debug")]
    pub fn clone_from(url: impl Into<String>, filter: F) -> Result<Self> {
        let url = url.into();
        let dir = tempfile::Builder::new()
            .prefix("spillway-")
            .tempdir()
            .map_err(WorkspaceError::TempDir)?;

        info!("clone {url} into {:?}", dir.path().display());
        syscall_non_interactive(
            "git",
            None,
            [OsStr::new("clone"), OsStr::new(&url), dir.path().as_os_str()],
        )?;

        Ok(Self { dir, url, filter })
    }

    /// Top-level directory of clone.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn git(&self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Result<String> {
        Ok(syscall_non_interactive("git", Some(self.path()), args)?)
    }

    // INVARIANT: Pushes always go to the URL the clone came from.
    fn ensure_origin(&self) -> Result<()> {
        let remotes = self.git(["remote"])?;
        if !remotes.lines().any(|remote| remote.trim() == "origin") {
            debug!("re-add origin {}", self.url);
            self.git(["remote", "add", "origin", self.url.as_str()])?;
        }

        Ok(())
    }
}

impl<F> Workspace for TempClone<F>
where
    F: HistoryFilter,
{
    fn checkout(&self, branch: &str) -> Result<()> {
        self.git(["checkout", branch])?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn strip_attribution(&self, branch: &str, marker: &str) -> Result<()> {
        let instruction = FilterInstruction::ReplaceMessage {
            refs: branch.to_string(),
            rules: attribution_rules(marker),
        };
        self.filter.run(self.path(), &instruction)?;
        self.ensure_origin()
    }

    #[instrument(skip(self), level = "debug")]
    fn force_push(&self, branch: &str) -> Result<()> {
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        info!("force-push {branch}");
        self.git(["push", "--force", "origin", refspec.as_str()])?;
        Ok(())
    }

    #[instrument(skip(self, message), level = "debug")]
    fn create_orphan(&self, branch: &str, message: &str) -> Result<()> {
        self.git(["checkout", "--orphan", branch])?;
        self.git(["rm", "-r", "-f", "--quiet", "--ignore-unmatch", "."])?;
        self.git(["commit", "--allow-empty", "-m", message])?;
        Ok(())
    }
}

impl<F> Drop for TempClone<F>
where
    F: HistoryFilter,
{
    fn drop(&mut self) {
        debug!("remove temporary clone {:?}", self.dir.path().display());
    }
}

/// Temporary clone error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Temporary directory cannot be created.
    #[error("failed to create temporary directory")]
    TempDir(#[source] std::io::Error),

    /// Git command fails.
    #[error(transparent)]
    Git(#[from] SyscallError),

    /// Attribution cannot be stripped.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Friendly result alias :3
pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;
