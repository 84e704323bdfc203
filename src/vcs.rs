// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control abstraction.
//!
//! Spillway never filters raw `git log` text to figure out what lives in
//! history. Instead, read-only questions are asked through
//! [`VersionControl`], which answers them structurally through libgit2. Only
//! operations libgit2 cannot perform, e.g., bundling or pickaxe searches, fall
//! back to the git binary.

use crate::syscall::{syscall_non_interactive, SyscallError};

use git2::{Delta, ErrorCode, Repository, StatusOptions};
use std::{
    collections::BTreeSet,
    ffi::OsStr,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Snapshot of repository state taken before a rewrite.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    /// No staged or unstaged changes to tracked files.
    pub clean: bool,

    /// Branch that HEAD points at, if any.
    pub current_branch: Option<String>,

    /// Default branch of `origin` as last fetched, if known.
    pub default_branch: Option<String>,
}

/// Named remote and its fetch URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

/// Read-only history queries and the few writes the orchestrator needs.
pub trait VersionControl {
    /// Top-level directory of working tree.
    fn root(&self) -> &Path;

    /// Repository name, i.e., name of top-level directory.
    fn name(&self) -> String {
        self.root()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repository".into())
    }

    /// Read current repository state.
    fn state(&self) -> Result<RepositoryState>;

    /// List every path that was ever added in any commit reachable from any
    /// ref, keeping only those accepted by `predicate`.
    fn paths_ever_added(&self, predicate: &dyn Fn(&Path) -> bool) -> Result<BTreeSet<PathBuf>>;

    /// List commits whose changes add or remove `literal`.
    fn commits_containing(&self, literal: &str) -> Result<Vec<String>>;

    /// List configured remotes.
    fn remotes(&self) -> Result<Vec<Remote>>;

    /// Re-add remotes that went missing, returning the ones re-added.
    fn restore_remotes(&self, remotes: &[Remote]) -> Result<Vec<Remote>>;

    /// Write bundle of all refs to `dest`.
    fn bundle_all(&self, dest: &Path) -> Result<()>;
}

/// Version control through libgit2 and the git binary.
pub struct GitRepository {
    repository: Repository,
    root: PathBuf,
}

impl GitRepository {
    /// Discover repository containing target path.
    ///
    /// # Errors
    ///
    /// - Return [`VcsError::NotARepository`] if no repository contains path.
    /// - Return [`VcsError::Bare`] if repository has no working tree.
    /// - Return [`VcsError::Git2`] if libgit2 operations fail.
    #[instrument(skip(path), level = "debug")]
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("discover repository from {:?}", path.display());
        let repository = Repository::discover(path).map_err(|err| match err.code() {
            ErrorCode::NotFound => VcsError::NotARepository {
                path: path.to_path_buf(),
            },
            _ => VcsError::Git2(err),
        })?;

        let root = repository
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| VcsError::Bare {
                path: repository.path().to_path_buf(),
            })?;

        Ok(Self { repository, root })
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let head = match self.repository.head() {
            Ok(head) => head,
            Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(None)
            }
            Err(err) => return Err(err.into()),
        };

        if !head.is_branch() {
            return Ok(None);
        }

        Ok(head.shorthand().map(ToString::to_string))
    }

    fn default_branch(&self) -> Option<String> {
        self.repository
            .find_reference("refs/remotes/origin/HEAD")
            .ok()
            .and_then(|reference| reference.symbolic_target().map(ToString::to_string))
            .and_then(|target| {
                target
                    .strip_prefix("refs/remotes/origin/")
                    .map(ToString::to_string)
            })
    }

    fn git(&self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Result<String> {
        Ok(syscall_non_interactive("git", Some(self.root.as_path()), args)?)
    }
}

impl VersionControl for GitRepository {
    fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn state(&self) -> Result<RepositoryState> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false)
            .include_ignored(false)
            .exclude_submodules(true);
        let clean = self.repository.statuses(Some(&mut opts))?.is_empty();

        Ok(RepositoryState {
            clean,
            current_branch: self.current_branch()?,
            default_branch: self.default_branch(),
        })
    }

    #[instrument(skip(self, predicate), level = "debug")]
    fn paths_ever_added(&self, predicate: &dyn Fn(&Path) -> bool) -> Result<BTreeSet<PathBuf>> {
        let mut paths = BTreeSet::new();
        let mut revwalk = self.repository.revwalk()?;
        revwalk.push_glob("*")?;

        for oid in revwalk {
            let commit = self.repository.find_commit(oid?)?;
            let tree = commit.tree()?;

            // INVARIANT: Diff against first parent, root commits diff against nothing.
            let parent_tree = match commit.parents().next() {
                Some(parent) => Some(parent.tree()?),
                None => None,
            };

            let diff = self
                .repository
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
            for delta in diff.deltas() {
                if delta.status() != Delta::Added {
                    continue;
                }

                if let Some(path) = delta.new_file().path() {
                    if predicate(path) {
                        paths.insert(path.to_path_buf());
                    }
                }
            }
        }

        debug!("matched {} historical paths", paths.len());
        Ok(paths)
    }

    fn commits_containing(&self, literal: &str) -> Result<Vec<String>> {
        let pickaxe = format!("-S{literal}");
        let output = self.git(["log", "--all", "--format=%H", pickaxe.as_str()])?;

        Ok(output
            .lines()
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    fn remotes(&self) -> Result<Vec<Remote>> {
        let mut remotes = Vec::new();
        for name in self.repository.remotes()?.iter().flatten() {
            let remote = self.repository.find_remote(name)?;
            if let Some(url) = remote.url() {
                remotes.push(Remote {
                    name: name.to_string(),
                    url: url.to_string(),
                });
            }
        }

        Ok(remotes)
    }

    fn restore_remotes(&self, remotes: &[Remote]) -> Result<Vec<Remote>> {
        let mut restored = Vec::new();
        for remote in remotes {
            if self.repository.find_remote(&remote.name).is_ok() {
                continue;
            }

            debug!("restore remote {} -> {}", remote.name, remote.url);
            self.repository.remote(&remote.name, &remote.url)?;
            restored.push(remote.clone());
        }

        Ok(restored)
    }

    fn bundle_all(&self, dest: &Path) -> Result<()> {
        self.git([
            OsStr::new("bundle"),
            OsStr::new("create"),
            dest.as_os_str(),
            OsStr::new("--all"),
        ])?;

        Ok(())
    }
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Path is not inside any repository.
    #[error("not inside a git repository: {:?}", path.display())]
    NotARepository { path: PathBuf },

    /// Repository has no working tree to clean up.
    #[error("repository at {:?} is bare", path.display())]
    Bare { path: PathBuf },

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Git binary fails.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;
