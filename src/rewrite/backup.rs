// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup management.
//!
//! Before history gets rewritten, every ref of the repository is captured in
//! a single bundle file. Bundles live outside of the repository in the backup
//! directory, one per invocation, named `<repo>_<YYYYmmdd_HHMMSS>.bundle`.
//! Spillway never overwrites or prunes a bundle, retention is left to the
//! operator.

use crate::vcs::{VcsError, VersionControl};

use chrono::{DateTime, Local};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::create_dir_all,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Handle to a finished backup bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    path: PathBuf,
    repo_name: String,
}

impl BackupHandle {
    /// Path to bundle file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Command that recreates repository from bundle.
    pub fn restore_command(&self) -> String {
        format!(
            "git clone {:?} {}-restored",
            self.path.display(),
            self.repo_name
        )
    }
}

impl Display for BackupHandle {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.path.display())
    }
}

/// Create backup bundles in a fixed directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    /// Construct new backup manager.
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    /// Bundle every ref of repository into a new backup file.
    ///
    /// # Errors
    ///
    /// - Return [`BackupError::CreateDir`] if backup directory cannot be
    ///   created.
    /// - Return [`BackupError::Bundle`] if bundle cannot be written.
    #[instrument(skip(self, vcs), level = "debug")]
    pub fn create(&self, vcs: &impl VersionControl) -> Result<BackupHandle> {
        create_dir_all(&self.backup_dir).map_err(|source| BackupError::CreateDir {
            source,
            backup_dir: self.backup_dir.clone(),
        })?;

        let repo_name = vcs.name();
        let path = self.unused_path(&repo_name, Local::now());
        info!("back up all refs of {repo_name} to {:?}", path.display());
        vcs.bundle_all(&path).map_err(|source| BackupError::Bundle {
            source,
            path: path.clone(),
        })?;

        Ok(BackupHandle { path, repo_name })
    }

    /// Path the next backup of repository would be written to.
    pub fn next_path(&self, vcs: &impl VersionControl) -> PathBuf {
        self.unused_path(&vcs.name(), Local::now())
    }

    // INVARIANT: Never reuse the path of an existing backup.
    fn unused_path(&self, repo_name: &str, now: DateTime<Local>) -> PathBuf {
        let stem = backup_stem(repo_name, now);
        let mut path = self.backup_dir.join(format!("{stem}.bundle"));
        let mut attempt = 1;
        while path.exists() {
            path = self.backup_dir.join(format!("{stem}-{attempt}.bundle"));
            attempt += 1;
        }

        path
    }
}

/// Name of backup without extension.
pub fn backup_stem(repo_name: &str, now: DateTime<Local>) -> String {
    format!("{repo_name}_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Backup error types.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Backup directory cannot be created.
    #[error("failed to create backup directory {:?}", backup_dir.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        backup_dir: PathBuf,
    },

    /// Bundle cannot be written.
    #[error("failed to write backup bundle {:?}", path.display())]
    Bundle {
        #[source]
        source: VcsError,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = BackupError> = std::result::Result<T, E>;
