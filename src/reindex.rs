// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Contributor reindex.
//!
//! Hosting services cache the contributor list of a repository and only
//! recompute it when the default branch changes. After attribution lines are
//! stripped from commit messages, the reindex forces that recomputation by
//! briefly pointing the default branch at a placeholder orphan branch.
//!
//! # State Machine
//!
//! ```text
//! Cloned -> BranchDetected -> DefaultBranchFlow | NonDefaultBranchFlow
//!        -> CleanedPushed
//!        -> [default flow only]
//!           OrphanCreated -> RemoteDefaultSwitched -> Verified -> Restored
//!           -> TempBranchDeleted
//!        -> Done
//! ```
//!
//! A run that dies while the placeholder is the default branch leaves the
//! remote misconfigured. The next run detects this on entry and restores a
//! real default branch before doing anything else.

pub mod remote;
pub mod verify;
pub mod workspace;

use crate::{
    config::ReindexSettings,
    reindex::{
        remote::{RemoteError, RemoteHost, RepoSlug},
        verify::{mentions, Verifier},
        workspace::{Workspace, WorkspaceError},
    },
};

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    time::Duration,
};
use tracing::{debug, info, instrument, warn};

/// Step of the reindex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexState {
    Cloned,
    BranchDetected,
    DefaultBranchFlow,
    NonDefaultBranchFlow,
    CleanedPushed,
    OrphanCreated,
    RemoteDefaultSwitched,
    Verified,
    Restored,
    TempBranchDeleted,
    Done,
}

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexRequest {
    /// Clone URL of repository.
    pub url: String,

    /// Branch to clean, remote default branch if absent.
    pub branch: Option<String>,

    /// Check public page after reindex.
    pub verify: bool,
}

/// Result of public page check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// No check was made.
    Skipped,

    /// Marker no longer shows up.
    Clean,

    /// Marker still shows up, cache not refreshed yet.
    MarkerPresent,

    /// Page could not be fetched.
    Unreachable(String),
}

/// Result of a finished reindex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexOutcome {
    pub slug: RepoSlug,
    pub branch: String,
    pub default_branch: String,
    pub healed: Option<String>,
    pub transitions: Vec<ReindexState>,
    pub verification: Verification,
}

impl Display for ReindexOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if let Some(healed) = &self.healed {
            writeln!(fmt, "Recovered from interrupted run, default branch restored to {healed}.")?;
        }

        writeln!(fmt, "Stripped attribution from {} of {} and force-pushed.", self.branch, self.slug)?;
        if !self.transitions.contains(&ReindexState::DefaultBranchFlow) {
            writeln!(
                fmt,
                "{} is not the default branch ({}), contributor list left alone.",
                self.branch, self.default_branch
            )?;
            return Ok(());
        }

        writeln!(fmt, "Default branch cycled to refresh contributors, now {}.", self.default_branch)?;
        match &self.verification {
            Verification::Skipped => writeln!(fmt, "Verification skipped."),
            Verification::Clean => writeln!(fmt, "Verified: {} no longer lists the marker.", self.slug.public_url()),
            Verification::MarkerPresent => writeln!(
                fmt,
                "Marker still visible on {}, the hosting cache may take a while to refresh.",
                self.slug.public_url()
            ),
            Verification::Unreachable(reason) => writeln!(fmt, "Verification failed: {reason}"),
        }
    }
}

/// Drive reindex against one hosted repository.
pub struct Reindexer<'a, H, V>
where
    H: RemoteHost,
    V: Verifier,
{
    settings: &'a ReindexSettings,
    host: &'a H,
    verifier: &'a V,
    bar: ProgressBar,
}

impl<'a, H, V> Reindexer<'a, H, V>
where
    H: RemoteHost,
    V: Verifier,
{
    /// Construct new reindexer.
    pub fn new(settings: &'a ReindexSettings, host: &'a H, verifier: &'a V, bar: ProgressBar) -> Self {
        Self {
            settings,
            host,
            verifier,
            bar,
        }
    }

    /// Run reindex, cloning through `open`.
    ///
    /// The workspace returned by `open` is dropped before this returns, on
    /// every path.
    ///
    /// # Errors
    ///
    /// - Return [`ReindexError::Remote`] if URL or hosting queries fail.
    /// - Return [`ReindexError::ReservedBranch`] if placeholder is requested.
    /// - Return [`ReindexError::Workspace`] if clone, strip, or push fails.
    /// - Return [`ReindexError::RemoteState`] if default branch cannot be set.
    #[instrument(skip(self, open), level = "debug")]
    pub async fn run<W, O>(&self, request: ReindexRequest, open: O) -> Result<ReindexOutcome>
    where
        W: Workspace,
        O: FnOnce(&str) -> Result<W, WorkspaceError>,
    {
        let mut slug = RepoSlug::parse(&request.url)?;
        if let Some(host) = self.settings.host.as_deref().filter(|host| *host != slug.host) {
            debug!("treat clone host {} as {host}", slug.host);
            slug.host = host.to_string();
        }

        let placeholder = self.settings.placeholder_branch.as_str();
        if request.branch.as_deref() == Some(placeholder) {
            return Err(ReindexError::ReservedBranch {
                branch: placeholder.to_string(),
            });
        }

        let healed = self.heal(&slug, request.branch.as_deref())?;

        let workspace = open(&request.url)?;
        let mut transitions = vec![ReindexState::Cloned];

        let default_branch = self.host.default_branch(&slug)?;
        let branch = request.branch.unwrap_or_else(|| default_branch.clone());
        transitions.push(ReindexState::BranchDetected);
        info!("clean {branch} of {slug}, default branch is {default_branch}");

        let default_flow = branch == default_branch;
        transitions.push(if default_flow {
            ReindexState::DefaultBranchFlow
        } else {
            ReindexState::NonDefaultBranchFlow
        });

        workspace.checkout(&branch)?;
        workspace.strip_attribution(&branch, &self.settings.identity_marker)?;
        workspace.force_push(&branch)?;
        transitions.push(ReindexState::CleanedPushed);

        let mut verification = Verification::Skipped;
        if default_flow {
            workspace.create_orphan(placeholder, "Refresh contributor list")?;
            workspace.force_push(placeholder)?;
            transitions.push(ReindexState::OrphanCreated);

            self.set_default(&slug, placeholder)?;
            transitions.push(ReindexState::RemoteDefaultSwitched);

            if request.verify {
                self.settle().await;
                verification = self.verify(&slug).await;
            }
            transitions.push(ReindexState::Verified);

            self.set_default(&slug, &branch)?;
            transitions.push(ReindexState::Restored);

            if let Err(error) = self.host.delete_branch(&slug, placeholder) {
                warn!("failed to delete {placeholder} on {slug}: {error}");
            }
            transitions.push(ReindexState::TempBranchDeleted);
        }

        drop(workspace);
        transitions.push(ReindexState::Done);

        Ok(ReindexOutcome {
            slug,
            default_branch: if default_flow { branch.clone() } else { default_branch },
            branch,
            healed,
            transitions,
            verification,
        })
    }

    // INVARIANT: Remote never keeps the placeholder as default once this returns.
    fn heal(&self, slug: &RepoSlug, requested: Option<&str>) -> Result<Option<String>> {
        let placeholder = self.settings.placeholder_branch.as_str();
        if self.host.default_branch(slug)? != placeholder {
            return Ok(None);
        }

        warn!("{slug} still has {placeholder} as default branch from an interrupted run");
        let branches = self.host.branches(slug)?;
        let target = recovery_target(&branches, requested, placeholder).ok_or_else(|| {
            ReindexError::NoRecoveryTarget {
                slug: slug.to_string(),
            }
        })?;

        self.set_default(slug, &target)?;
        if let Err(error) = self.host.delete_branch(slug, placeholder) {
            warn!("failed to delete leftover {placeholder} on {slug}: {error}");
        }
        info!("restored default branch of {slug} to {target}");

        Ok(Some(target))
    }

    fn set_default(&self, slug: &RepoSlug, branch: &str) -> Result<()> {
        info!("set default branch of {slug} to {branch}");
        self.host
            .set_default_branch(slug, branch)
            .map_err(|source| ReindexError::RemoteState {
                source,
                branch: branch.to_string(),
            })
    }

    async fn settle(&self) {
        let delay = self.settings.settle_delay();
        if delay.is_zero() {
            return;
        }

        if let Ok(style) = ProgressStyle::with_template("{spinner:.yellow} {msg} {elapsed:.green}") {
            self.bar.set_style(style);
        }
        self.bar
            .set_message(format!("waiting {}s for hosting service to settle", delay.as_secs()));
        self.bar.enable_steady_tick(Duration::from_millis(100));
        tokio::time::sleep(delay).await;
        self.bar.finish_and_clear();
    }

    async fn verify(&self, slug: &RepoSlug) -> Verification {
        let url = slug.public_url();
        match self.verifier.fetch(&url).await {
            Ok(body) if mentions(&body, &self.settings.identity_marker) => {
                warn!(
                    "{url} still mentions {}, hosting cache not refreshed yet",
                    self.settings.identity_marker
                );
                Verification::MarkerPresent
            }
            Ok(_) => Verification::Clean,
            Err(error) => {
                warn!("cannot verify {url}: {error}");
                Verification::Unreachable(error.to_string())
            }
        }
    }
}

/// Pick a real branch to restore as default after an interrupted run.
///
/// Prefers requested branch, then `main`, then `master`, then whatever other
/// branch the remote lists first.
pub fn recovery_target(branches: &[String], requested: Option<&str>, placeholder: &str) -> Option<String> {
    let exists = |name: &str| branches.iter().any(|branch| branch == name);

    requested
        .into_iter()
        .chain(["main", "master"])
        .find(|name| *name != placeholder && exists(*name))
        .map(ToString::to_string)
        .or_else(|| {
            branches
                .iter()
                .find(|branch| branch.as_str() != placeholder)
                .cloned()
        })
}

/// Contributor reindex error types.
#[derive(Debug, thiserror::Error)]
pub enum ReindexError {
    /// Placeholder branch cannot be cleaned.
    #[error("{branch} is reserved for the reindex and cannot be cleaned")]
    ReservedBranch { branch: String },

    /// Interrupted run left no branch to restore.
    #[error("{slug} only has the placeholder branch, cannot restore a default branch")]
    NoRecoveryTarget { slug: String },

    /// Default branch cannot be changed.
    #[error("failed to set default branch to {branch}, repository may be left misconfigured")]
    RemoteState {
        #[source]
        source: RemoteError,
        branch: String,
    },

    /// Hosting service cannot be queried.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Local clone operation fails.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// Friendly result alias :3
pub type Result<T, E = ReindexError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reindex::verify::NetworkError, syscall::SyscallError};
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, rc::Rc};

    type Journal = Rc<RefCell<Vec<String>>>;

    struct FakeHost {
        default: RefCell<String>,
        branches: RefCell<Vec<String>>,
        refuse_default: Option<String>,
        journal: Journal,
    }

    impl FakeHost {
        fn new(default: &str, branches: &[&str], journal: &Journal) -> Self {
            Self {
                default: RefCell::new(default.into()),
                branches: RefCell::new(branches.iter().map(ToString::to_string).collect()),
                refuse_default: None,
                journal: journal.clone(),
            }
        }

        fn failure() -> RemoteError {
            RemoteError::Syscall(SyscallError::Failed {
                cmd: "gh".into(),
                args: vec![],
                message: "HTTP 403".into(),
            })
        }
    }

    impl RemoteHost for FakeHost {
        fn default_branch(&self, _: &RepoSlug) -> remote::Result<String> {
            Ok(self.default.borrow().clone())
        }

        fn set_default_branch(&self, _: &RepoSlug, branch: &str) -> remote::Result<()> {
            if self.refuse_default.as_deref() == Some(branch) {
                return Err(Self::failure());
            }

            self.journal.borrow_mut().push(format!("set-default {branch}"));
            *self.default.borrow_mut() = branch.into();
            Ok(())
        }

        fn branches(&self, _: &RepoSlug) -> remote::Result<Vec<String>> {
            Ok(self.branches.borrow().clone())
        }

        fn delete_branch(&self, _: &RepoSlug, branch: &str) -> remote::Result<()> {
            self.journal.borrow_mut().push(format!("delete {branch}"));
            self.branches.borrow_mut().retain(|name| name != branch);
            Ok(())
        }
    }

    struct FakeWorkspace {
        journal: Journal,
    }

    impl Workspace for FakeWorkspace {
        fn checkout(&self, branch: &str) -> workspace::Result<()> {
            self.journal.borrow_mut().push(format!("checkout {branch}"));
            Ok(())
        }

        fn strip_attribution(&self, branch: &str, marker: &str) -> workspace::Result<()> {
            self.journal.borrow_mut().push(format!("strip {branch} {marker}"));
            Ok(())
        }

        fn force_push(&self, branch: &str) -> workspace::Result<()> {
            self.journal.borrow_mut().push(format!("push {branch}"));
            Ok(())
        }

        fn create_orphan(&self, branch: &str, _: &str) -> workspace::Result<()> {
            self.journal.borrow_mut().push(format!("orphan {branch}"));
            Ok(())
        }
    }

    impl Drop for FakeWorkspace {
        fn drop(&mut self) {
            self.journal.borrow_mut().push("teardown".into());
        }
    }

    struct FakeVerifier {
        body: Option<&'static str>,
    }

    impl Verifier for FakeVerifier {
        async fn fetch(&self, url: &str) -> verify::Result<String> {
            assert_eq!(url, "https://github.com/awkless/spillway");
            match self.body {
                Some(body) => Ok(body.to_string()),
                None => Err(NetworkError::Client(
                    reqwest::Client::builder()
                        .user_agent("\n")
                        .build()
                        .unwrap_err(),
                )),
            }
        }
    }

    fn settings() -> ReindexSettings {
        ReindexSettings {
            settle_seconds: 0,
            ..Default::default()
        }
    }

    fn request(branch: Option<&str>) -> ReindexRequest {
        ReindexRequest {
            url: "git@github.com:awkless/spillway.git".into(),
            branch: branch.map(ToString::to_string),
            verify: true,
        }
    }

    async fn run(
        host: &FakeHost,
        verifier: &FakeVerifier,
        journal: &Journal,
        branch: Option<&str>,
    ) -> Result<ReindexOutcome> {
        let settings = settings();
        let reindexer = Reindexer::new(&settings, host, verifier, ProgressBar::hidden());
        let journal = journal.clone();
        reindexer
            .run(request(branch), move |url| {
                assert_eq!(url, "git@github.com:awkless/spillway.git");
                Ok(FakeWorkspace { journal })
            })
            .await
    }

    fn journal() -> Journal {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[tokio::test]
    async fn non_default_branch_only_pushes_that_branch() -> anyhow::Result<()> {
        let journal = journal();
        let host = FakeHost::new("main", &["main", "feature-x"], &journal);
        let verifier = FakeVerifier { body: Some("") };

        let outcome = run(&host, &verifier, &journal, Some("feature-x")).await?;

        assert_eq!(
            *journal.borrow(),
            ["checkout feature-x", "strip feature-x claude", "push feature-x", "teardown"]
        );
        assert_eq!(*host.default.borrow(), "main");
        assert_eq!(
            outcome.transitions,
            [
                ReindexState::Cloned,
                ReindexState::BranchDetected,
                ReindexState::NonDefaultBranchFlow,
                ReindexState::CleanedPushed,
                ReindexState::Done,
            ]
        );
        assert_eq!(outcome.verification, Verification::Skipped);
        Ok(())
    }

    #[tokio::test]
    async fn default_branch_cycles_through_placeholder() -> anyhow::Result<()> {
        let journal = journal();
        let host = FakeHost::new("main", &["main"], &journal);
        let verifier = FakeVerifier {
            body: Some("Contributors: awkless"),
        };

        let outcome = run(&host, &verifier, &journal, None).await?;

        assert_eq!(
            *journal.borrow(),
            [
                "checkout main",
                "strip main claude",
                "push main",
                "orphan spillway-reindex",
                "push spillway-reindex",
                "set-default spillway-reindex",
                "set-default main",
                "delete spillway-reindex",
                "teardown",
            ]
        );
        assert_eq!(
            outcome.transitions,
            [
                ReindexState::Cloned,
                ReindexState::BranchDetected,
                ReindexState::DefaultBranchFlow,
                ReindexState::CleanedPushed,
                ReindexState::OrphanCreated,
                ReindexState::RemoteDefaultSwitched,
                ReindexState::Verified,
                ReindexState::Restored,
                ReindexState::TempBranchDeleted,
                ReindexState::Done,
            ]
        );
        assert_eq!(outcome.verification, Verification::Clean);
        assert_eq!(outcome.default_branch, "main");
        Ok(())
    }

    #[tokio::test]
    async fn leftover_placeholder_is_healed_first() -> anyhow::Result<()> {
        let journal = journal();
        let host = FakeHost::new("spillway-reindex", &["spillway-reindex", "develop", "trunk"], &journal);
        let verifier = FakeVerifier {
            body: Some("Claude contributed"),
        };

        let outcome = run(&host, &verifier, &journal, Some("trunk")).await?;

        let journal = journal.borrow();
        assert_eq!(journal[0], "set-default trunk");
        assert_eq!(journal[1], "delete spillway-reindex");
        assert_eq!(outcome.healed.as_deref(), Some("trunk"));
        assert_eq!(*host.default.borrow(), "trunk");
        assert_eq!(outcome.verification, Verification::MarkerPresent);
        assert!(!host.branches.borrow().contains(&"spillway-reindex".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_page_is_only_a_warning() -> anyhow::Result<()> {
        let journal = journal();
        let host = FakeHost::new("main", &["main"], &journal);
        let verifier = FakeVerifier { body: None };

        let outcome = run(&host, &verifier, &journal, Some("main")).await?;

        assert!(matches!(outcome.verification, Verification::Unreachable(_)));
        assert_eq!(*host.default.borrow(), "main");
        Ok(())
    }

    #[tokio::test]
    async fn failed_restore_is_fatal_and_tears_down() {
        let journal = journal();
        let mut host = FakeHost::new("main", &["main"], &journal);
        host.refuse_default = Some("main".into());
        let verifier = FakeVerifier { body: Some("") };

        let result = run(&host, &verifier, &journal, None).await;

        match result {
            Err(ReindexError::RemoteState { branch, .. }) => assert_eq!(branch, "main"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(journal.borrow().last().map(String::as_str), Some("teardown"));
    }

    #[tokio::test]
    async fn ssh_alias_uses_configured_host() -> anyhow::Result<()> {
        let journal = journal();
        let host = FakeHost::new("main", &["main"], &journal);
        let verifier = FakeVerifier { body: Some("") };
        let settings = ReindexSettings {
            host: Some("github.com".into()),
            ..settings()
        };
        let reindexer = Reindexer::new(&settings, &host, &verifier, ProgressBar::hidden());

        let workspace_journal = journal.clone();
        let outcome = reindexer
            .run(
                ReindexRequest {
                    url: "git@github-work:awkless/spillway.git".into(),
                    branch: None,
                    verify: true,
                },
                move |_| Ok(FakeWorkspace { journal: workspace_journal }),
            )
            .await?;

        assert_eq!(outcome.slug.host, "github.com");
        assert_eq!(outcome.verification, Verification::Clean);
        Ok(())
    }

    #[tokio::test]
    async fn enterprise_url_keeps_its_host() -> anyhow::Result<()> {
        let journal = journal();
        let host = FakeHost::new("main", &["main"], &journal);
        let verifier = FakeVerifier { body: None };
        let settings = settings();
        let reindexer = Reindexer::new(&settings, &host, &verifier, ProgressBar::hidden());

        let workspace_journal = journal.clone();
        let outcome = reindexer
            .run(
                ReindexRequest {
                    url: "https://git.corp.example/team/app.git".into(),
                    branch: None,
                    verify: false,
                },
                move |_| Ok(FakeWorkspace { journal: workspace_journal }),
            )
            .await?;

        assert_eq!(outcome.slug.host, "git.corp.example");
        assert_eq!(outcome.slug.gh_spec(), "git.corp.example/team/app");
        assert_eq!(outcome.verification, Verification::Skipped);
        Ok(())
    }

    #[tokio::test]
    async fn placeholder_cannot_be_target() {
        let journal = journal();
        let host = FakeHost::new("main", &["main"], &journal);
        let verifier = FakeVerifier { body: Some("") };

        let result = run(&host, &verifier, &journal, Some("spillway-reindex")).await;

        assert!(matches!(result, Err(ReindexError::ReservedBranch { .. })));
        assert!(journal.borrow().is_empty());
    }

    #[test]
    fn recovery_target_prefers_requested_then_main_then_master() {
        let branches = ["spillway-reindex", "develop", "master", "main"]
            .map(String::from)
            .to_vec();
        assert_eq!(
            recovery_target(&branches, Some("develop"), "spillway-reindex").as_deref(),
            Some("develop")
        );
        assert_eq!(
            recovery_target(&branches, Some("gone"), "spillway-reindex").as_deref(),
            Some("main")
        );
        assert_eq!(
            recovery_target(&branches[..3], None, "spillway-reindex").as_deref(),
            Some("master")
        );
        assert_eq!(
            recovery_target(&branches[..2], None, "spillway-reindex").as_deref(),
            Some("develop")
        );
        assert_eq!(recovery_target(&branches[..1], None, "spillway-reindex"), None);
    }
}
