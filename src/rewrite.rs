// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! History cleanup orchestration.
//!
//! A cleanup runs through a fixed sequence of steps:
//!
//! 1. Resolve what to remove, see [`target`].
//! 2. Check preconditions, see [`precondition`].
//! 3. Back up every ref, see [`backup`].
//! 4. Rewrite history through git-filter-repo, see [`filter`].
//! 5. Synchronize remotes that the rewrite dropped, and tell the operator how
//!    to publish the result.
//!
//! Dry runs stop after computing what would match. They never back up,
//! never rewrite, and never push.
//!
//! # Failure Model
//!
//! Precondition and argument failures abort before anything is touched. A
//! rewrite failure after the backup aborts immediately, and its error always
//! names the backup to restore from. There is no partial retry.

pub mod backup;
pub mod filter;
pub mod precondition;
pub mod scan;
pub mod target;

use crate::{
    config::Settings,
    prompt::{ConfirmPrompter, PromptError},
    rewrite::{
        backup::{BackupError, BackupHandle, BackupManager},
        filter::{FilterError, FilterInstruction, HistoryFilter, ReplaceRule},
        precondition::{require_clean, PreconditionError},
        scan::ScanReport,
        target::{Action, InvalidArgument, RewriteTarget},
    },
    vcs::{Remote, VcsError, VersionControl},
};

use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Options that change how a rewrite behaves.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Report what would match, change nothing.
    pub dry_run: bool,

    /// Skip the backup. Destructive.
    pub no_backup: bool,
}

/// Result of a rewrite, real or dry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    /// Number of matched paths, or commits for string targets.
    pub matched: usize,

    /// Matched paths or commits, for display.
    pub matches: Vec<String>,

    /// No mutation was performed.
    pub dry_run: bool,

    /// Backup taken before the rewrite.
    pub backup: Option<BackupHandle>,

    /// Next steps for the operator.
    pub advisories: Vec<String>,
}

impl Display for RewriteResult {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.dry_run {
            writeln!(fmt, "Dry run: {} matches, nothing was changed.", self.matched)?;
        } else {
            writeln!(fmt, "Rewrote history: {} matches.", self.matched)?;
        }

        for item in &self.matches {
            writeln!(fmt, "    {item}")?;
        }

        if let Some(backup) = &self.backup {
            writeln!(fmt, "Backup: {backup}")?;
        }

        if !self.advisories.is_empty() {
            writeln!(fmt, "\nNext steps:")?;
            for advisory in &self.advisories {
                writeln!(fmt, "  - {advisory}")?;
            }
        }

        Ok(())
    }
}

/// What a cleanup run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// List mode report.
    Scan(ScanReport),

    /// Backup-only mode.
    Backup(BackupHandle),

    /// Backup-only mode under dry run, with the bundle it would write.
    BackupPreview(PathBuf),

    /// Rewrite, dry or real.
    Rewrite(RewriteResult),

    /// Operator declined the rewrite.
    Declined,
}

impl Display for Outcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Scan(report) => write!(fmt, "{report}"),
            Self::Backup(handle) => {
                writeln!(fmt, "Backup: {handle}")?;
                writeln!(fmt, "Restore with: {}", handle.restore_command())
            }
            Self::BackupPreview(path) => {
                writeln!(fmt, "Dry run: would write backup to {}, nothing was changed.", path.display())
            }
            Self::Rewrite(result) => write!(fmt, "{result}"),
            Self::Declined => writeln!(fmt, "Canceled by operator. No changes made."),
        }
    }
}

/// History cleanup of one repository.
pub struct Cleanup<'a, V, F>
where
    V: VersionControl,
    F: HistoryFilter,
{
    settings: &'a Settings,
    vcs: &'a V,
    filter: &'a F,
}

impl<'a, V, F> Cleanup<'a, V, F>
where
    V: VersionControl,
    F: HistoryFilter,
{
    /// Construct new cleanup.
    pub fn new(settings: &'a Settings, vcs: &'a V, filter: &'a F) -> Self {
        Self {
            settings,
            vcs,
            filter,
        }
    }

    /// Run resolved action.
    ///
    /// # Errors
    ///
    /// - Return [`RewriteError::InvalidArgument`] for unimplemented modes.
    /// - Return [`RewriteError::Precondition`] if repository is not ready.
    /// - Return [`RewriteError::Backup`] if backup fails.
    /// - Return [`RewriteError::Interrupted`] if rewrite fails after backup.
    pub fn run(
        &self,
        action: Action,
        options: RunOptions,
        prompter: &mut dyn ConfirmPrompter,
    ) -> Result<Outcome> {
        match action {
            Action::List => Ok(Outcome::Scan(scan::scan(self.vcs, self.settings)?)),
            Action::BackupOnly if options.dry_run => {
                Ok(Outcome::BackupPreview(self.backup_manager().next_path(self.vcs)))
            }
            Action::BackupOnly => Ok(Outcome::Backup(self.backup_manager().create(self.vcs)?)),
            Action::Rewrite(target) => self.rewrite(target, options, prompter),
        }
    }

    #[instrument(skip(self, target, prompter), level = "debug")]
    fn rewrite(
        &self,
        target: RewriteTarget,
        options: RunOptions,
        prompter: &mut dyn ConfirmPrompter,
    ) -> Result<Outcome> {
        if let RewriteTarget::Regex(_) = target {
            return Err(InvalidArgument::Unimplemented { flag: "--regex" }.into());
        }

        if options.dry_run {
            return Ok(Outcome::Rewrite(self.preview(&target)?));
        }

        // INVARIANT: All preconditions hold before the first mutation.
        let state = self.vcs.state()?;
        require_clean(self.vcs.root(), &state)?;
        self.filter.ensure_available()?;

        let plan = self.plan(&target)?;
        if plan.matched() == 0 {
            return Ok(Outcome::Rewrite(nothing_matched(&target)));
        }

        info!("{target} matches {} items in history of {}", plan.matched(), self.vcs.name());
        let prompt = format!(
            "Rewrite entire history of {} to remove {}? This cannot be undone without the backup.",
            self.vcs.name(),
            target
        );
        if !prompter.confirm(&prompt, false)? {
            return Ok(Outcome::Declined);
        }

        let backup = if options.no_backup {
            warn!("skipping backup as requested, rewritten history cannot be restored by spillway");
            None
        } else {
            let handle = self.backup_manager().create(self.vcs)?;
            info!("backup written to {handle}");
            Some(handle)
        };

        let remotes = self.vcs.remotes()?;
        self.execute(&plan)
            .map_err(|err| interrupted(err, backup.as_ref()))?;
        let restored = self
            .vcs
            .restore_remotes(&remotes)
            .map_err(|err| interrupted(err.into(), backup.as_ref()))?;
        for remote in &restored {
            info!("restored remote {} -> {}", remote.name, remote.url);
        }

        let advisories = self.advisories(&target, &remotes, backup.as_ref());
        Ok(Outcome::Rewrite(RewriteResult {
            matched: plan.matched(),
            matches: plan.matches(),
            dry_run: false,
            backup,
            advisories,
        }))
    }

    fn preview(&self, target: &RewriteTarget) -> Result<RewriteResult> {
        let plan = self.plan(target)?;
        let mut advisories = Vec::new();
        if plan.matched() > 0 {
            advisories.push("Re-run without --dry-run to rewrite history.".to_string());
        }

        Ok(RewriteResult {
            matched: plan.matched(),
            matches: plan.matches(),
            dry_run: true,
            backup: None,
            advisories,
        })
    }

    // INVARIANT: Planning only reads history.
    fn plan(&self, target: &RewriteTarget) -> Result<Plan> {
        let plan = match target {
            RewriteTarget::LiteralString(literal) => Plan::Replace {
                commits: self.vcs.commits_containing(literal)?,
                rule: ReplaceRule::Literal {
                    from: literal.clone(),
                    to: self.settings.redaction.clone(),
                },
            },
            RewriteTarget::AiArtifactSet(patterns) => {
                // INVARIANT: Each path belongs to the first pattern that matches it.
                let mut claimed = BTreeSet::<PathBuf>::new();
                let mut batches = Vec::new();
                for pattern in patterns {
                    let paths = self
                        .vcs
                        .paths_ever_added(&|path| pattern.matches(path) && !claimed.contains(path))?;
                    if paths.is_empty() {
                        info!("ai artifact {pattern} not found in history");
                    }
                    claimed.extend(paths.iter().cloned());
                    batches.push((pattern.to_string(), paths.into_iter().collect()));
                }
                Plan::Batch(batches)
            }
            RewriteTarget::PatternGlob(glob) => Plan::Glob {
                glob: glob.as_str().to_string(),
                paths: self.matching_paths(target)?,
            },
            RewriteTarget::File(_) | RewriteTarget::Directory(_) => Plan::Paths {
                directory: matches!(target, RewriteTarget::Directory(_)),
                target: target_path(target),
                paths: self.matching_paths(target)?,
            },
            RewriteTarget::Regex(_) => {
                return Err(InvalidArgument::Unimplemented { flag: "--regex" }.into())
            }
        };

        Ok(plan)
    }

    fn matching_paths(&self, target: &RewriteTarget) -> Result<Vec<PathBuf>> {
        Ok(self
            .vcs
            .paths_ever_added(&|path| target.matches_path(path))?
            .into_iter()
            .collect())
    }

    fn execute(&self, plan: &Plan) -> Result<()> {
        let root = self.vcs.root();
        match plan {
            Plan::Paths {
                directory, target, ..
            } => {
                let mut path = target.to_string_lossy().into_owned();
                if *directory {
                    path.push('/');
                }
                self.filter
                    .run(root, &FilterInstruction::ExcludePaths(vec![path]))?;
            }
            Plan::Glob { glob, .. } => {
                self.filter
                    .run(root, &FilterInstruction::ExcludeGlob(glob.clone()))?;
            }
            Plan::Replace { rule, .. } => {
                self.filter
                    .run(root, &FilterInstruction::ReplaceText(vec![rule.clone()]))?;
            }
            Plan::Batch(batches) => {
                // INVARIANT: Each pattern is its own rewrite, missing patterns are skipped.
                for (pattern, paths) in batches {
                    if paths.is_empty() {
                        continue;
                    }

                    info!("remove ai artifact {pattern} ({} paths)", paths.len());
                    let paths = paths
                        .iter()
                        .map(|path| path.to_string_lossy().into_owned())
                        .collect();
                    self.filter
                        .run(root, &FilterInstruction::ExcludePaths(paths))?;
                }
            }
        }

        Ok(())
    }

    fn advisories(
        &self,
        target: &RewriteTarget,
        remotes: &[Remote],
        backup: Option<&BackupHandle>,
    ) -> Vec<String> {
        let mut advisories = Vec::new();
        if remotes.is_empty() {
            advisories.push("No remote configured, add one before publishing the rewritten history.".into());
        }
        for remote in remotes {
            advisories.push(format!("git push {} --force --all", remote.name));
            advisories.push(format!("git push {} --force --tags", remote.name));
        }

        advisories.push(
            "Tell collaborators to re-clone. Old clones will bring removed content back on their next push."
                .into(),
        );
        if let RewriteTarget::LiteralString(_) = target {
            advisories.push("Rotate the leaked credential. Rewriting history does not revoke it.".into());
        }

        match backup {
            Some(backup) => advisories.push(format!("Restore if needed: {}", backup.restore_command())),
            None => advisories.push("No backup was taken for this rewrite.".into()),
        }

        advisories
    }

    fn backup_manager(&self) -> BackupManager {
        BackupManager::new(&self.settings.backup_dir)
    }
}

/// Read-only rewrite plan computed before anything mutates.
#[derive(Debug)]
enum Plan {
    Paths {
        directory: bool,
        target: PathBuf,
        paths: Vec<PathBuf>,
    },
    Glob {
        glob: String,
        paths: Vec<PathBuf>,
    },
    Replace {
        commits: Vec<String>,
        rule: ReplaceRule,
    },
    Batch(Vec<(String, Vec<PathBuf>)>),
}

impl Plan {
    fn matched(&self) -> usize {
        match self {
            Self::Paths { paths, .. } | Self::Glob { paths, .. } => paths.len(),
            Self::Replace { commits, .. } => commits.len(),
            Self::Batch(batches) => batches.iter().map(|(_, paths)| paths.len()).sum(),
        }
    }

    fn matches(&self) -> Vec<String> {
        match self {
            Self::Paths { paths, .. } | Self::Glob { paths, .. } => display_paths(paths),
            Self::Replace { commits, .. } => commits.clone(),
            Self::Batch(batches) => batches
                .iter()
                .filter(|(_, paths)| !paths.is_empty())
                .flat_map(|(pattern, paths)| {
                    paths
                        .iter()
                        .map(move |path| format!("[{pattern}] {}", path.display()))
                })
                .collect(),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect()
}

fn target_path(target: &RewriteTarget) -> PathBuf {
    match target {
        RewriteTarget::File(path) | RewriteTarget::Directory(path) => path.clone(),
        _ => PathBuf::new(),
    }
}

fn nothing_matched(target: &RewriteTarget) -> RewriteResult {
    let advisory = match target {
        RewriteTarget::AiArtifactSet(_) => "No ai artifacts found in history.".to_string(),
        target => format!("Nothing in history matches {target}, history left untouched."),
    };
    warn!("{advisory}");

    RewriteResult {
        advisories: vec![advisory],
        ..Default::default()
    }
}

fn interrupted(source: RewriteError, backup: Option<&BackupHandle>) -> RewriteError {
    match backup {
        Some(backup) => RewriteError::Interrupted {
            source: Box::new(source),
            backup: backup.path().to_path_buf(),
        },
        None => source,
    }
}

/// History cleanup error types.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    /// Repository is not ready for a rewrite.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// Operator asked for something unusable.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),

    /// Backup cannot be taken.
    #[error(transparent)]
    Backup(#[from] BackupError),

    /// Rewrite tool fails.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Repository cannot be read.
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// Confirmation prompt fails.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Rewrite failed after backup was taken.
    #[error("history rewrite failed, restore from backup at {:?}", backup.display())]
    Interrupted {
        #[source]
        source: Box<RewriteError>,
        backup: PathBuf,
    },
}

impl RewriteError {
    /// Backup that can undo a failed rewrite, if any.
    pub fn backup(&self) -> Option<&Path> {
        match self {
            Self::Interrupted { backup, .. } => Some(backup.as_path()),
            _ => None,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = RewriteError> = std::result::Result<T, E>;
