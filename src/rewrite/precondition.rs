// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Precondition checks.
//!
//! Every check fails fast with its own error variant, and nothing here ever
//! mutates the repository. Order matters: repository first, clean working
//! tree second, external tooling last.

use crate::vcs::{GitRepository, RepositoryState, VcsError};

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Open repository containing target path.
///
/// # Errors
///
/// - Return [`PreconditionError::NotARepository`] if path is not inside a
///   repository with a working tree.
/// - Return [`PreconditionError::Vcs`] if repository cannot be read.
pub fn open_repository(path: impl AsRef<Path>) -> Result<GitRepository> {
    GitRepository::discover(path.as_ref()).map_err(|err| match err {
        VcsError::NotARepository { path } | VcsError::Bare { path } => {
            PreconditionError::NotARepository { path }
        }
        err => PreconditionError::Vcs(err),
    })
}

/// Require working tree without staged or unstaged changes.
///
/// # Errors
///
/// - Return [`PreconditionError::DirtyTree`] if tracked files changed.
pub fn require_clean(root: &Path, state: &RepositoryState) -> Result<()> {
    if !state.clean {
        return Err(PreconditionError::DirtyTree {
            root: root.to_path_buf(),
        });
    }

    Ok(())
}

/// Locate external tool on `PATH`.
///
/// Logs install hints before failing so the operator knows how to fix it.
///
/// # Errors
///
/// - Return [`PreconditionError::MissingTool`] if tool cannot be found.
pub fn require_tool(tool: &str) -> Result<PathBuf> {
    match which::which(tool) {
        Ok(path) => {
            debug!("found {tool} at {:?}", path.display());
            Ok(path)
        }
        Err(_) => {
            let hints = install_hints(tool);
            warn!("{tool} not found in PATH, install it with one of:");
            for hint in &hints {
                warn!("  {hint}");
            }

            Err(PreconditionError::MissingTool {
                tool: tool.to_string(),
                hints,
            })
        }
    }
}

/// Platform-specific install hints for external tool.
pub fn install_hints(tool: &str) -> Vec<String> {
    match tool {
        "git-filter-repo" => vec![
            "Debian/Ubuntu: sudo apt install git-filter-repo".into(),
            "Fedora: sudo dnf install git-filter-repo".into(),
            "macOS: brew install git-filter-repo".into(),
            "Python: pipx install git-filter-repo (or pip install --user git-filter-repo)".into(),
            "From source: curl -fsSLo ~/.local/bin/git-filter-repo \
             https://raw.githubusercontent.com/newren/git-filter-repo/main/git-filter-repo \
             && chmod +x ~/.local/bin/git-filter-repo"
                .into(),
        ],
        "gh" => vec![
            "Debian/Ubuntu: sudo apt install gh".into(),
            "Fedora: sudo dnf install gh".into(),
            "macOS: brew install gh".into(),
            "From source: https://github.com/cli/cli#installation".into(),
        ],
        "git" => vec![
            "Debian/Ubuntu: sudo apt install git".into(),
            "Fedora: sudo dnf install git".into(),
            "macOS: xcode-select --install (or brew install git)".into(),
        ],
        other => vec![format!("install {other} with your system package manager")],
    }
}

/// Precondition error types.
#[derive(Debug, thiserror::Error)]
pub enum PreconditionError {
    /// Not inside a repository with a working tree.
    #[error("not inside a git working tree: {:?}", path.display())]
    NotARepository { path: PathBuf },

    /// Working tree has staged or unstaged changes.
    #[error("working tree at {:?} has uncommitted changes, commit or stash them first", root.display())]
    DirtyTree { root: PathBuf },

    /// External tool is not installed.
    #[error("required tool {tool} not found in PATH")]
    MissingTool { tool: String, hints: Vec<String> },

    /// Repository could not be inspected.
    #[error(transparent)]
    Vcs(VcsError),
}

/// Friendly result alias :3
pub type Result<T, E = PreconditionError> = std::result::Result<T, E>;
