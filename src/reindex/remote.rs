// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hosting service seam.
//!
//! The default-branch setting only exists on the hosting service, so it is
//! read and written through its command-line client. [`RemoteHost`] keeps
//! the reindex state machine independent of that client.

use crate::syscall::{syscall_non_interactive, SyscallError};

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};
use tracing::{debug, instrument};

/// Repository location on hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Parse slug out of clone URL.
    ///
    /// Accepts `https://host/owner/name`, `ssh://[user@]host[:port]/owner/name`
    /// and scp-like `user@host:owner/name`, with or without `.git` suffix.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::InvalidUrl`] if URL names no owner and
    ///   repository.
    pub fn parse(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref().trim();
        let invalid = || RemoteError::InvalidUrl { url: url.to_string() };

        let (host, path) = if let Some((_, rest)) = url.split_once("://") {
            let (authority, path) = rest.split_once('/').ok_or_else(invalid)?;
            let host = authority.rsplit('@').next().unwrap_or(authority);
            let host = host.split(':').next().unwrap_or(host);
            (host, path)
        } else if let Some((authority, path)) = url.split_once(':') {
            let host = authority.rsplit('@').next().unwrap_or(authority);
            (host, path)
        } else {
            return Err(invalid());
        };

        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let (owner, name) = path.rsplit_once('/').ok_or_else(invalid)?;
        if host.is_empty() || owner.is_empty() || name.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Public page of repository.
    pub fn public_url(&self) -> String {
        format!("https://{}/{}/{}", self.host, self.owner, self.name)
    }

    /// Repository argument understood by `gh repo`.
    pub fn gh_spec(&self) -> String {
        if self.host == "github.com" {
            format!("{}/{}", self.owner, self.name)
        } else {
            format!("{}/{}/{}", self.host, self.owner, self.name)
        }
    }

    fn api_path(&self) -> String {
        format!("repos/{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoSlug {
    type Err = RemoteError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::parse(data)
    }
}

impl Display for RepoSlug {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}/{}/{}", self.host, self.owner, self.name)
    }
}

/// Repository settings that only live on the hosting service.
pub trait RemoteHost {
    /// Current default branch.
    fn default_branch(&self, slug: &RepoSlug) -> Result<String>;

    /// Change default branch.
    fn set_default_branch(&self, slug: &RepoSlug, branch: &str) -> Result<()>;

    /// Every branch the service knows about.
    fn branches(&self, slug: &RepoSlug) -> Result<Vec<String>>;

    /// Delete branch on the service.
    fn delete_branch(&self, slug: &RepoSlug, branch: &str) -> Result<()>;
}

/// Hosting service access through the GitHub CLI.
#[derive(Debug, Clone)]
pub struct GhCli {
    program: PathBuf,
}

impl GhCli {
    /// Name of hosting client binary.
    pub const TOOL: &'static str = "gh";

    /// Construct new client that runs target program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn gh(&self, args: Vec<OsString>) -> Result<String> {
        Ok(syscall_non_interactive(&self.program, None, args)?)
    }

    fn api(&self, slug: &RepoSlug, args: &[&str]) -> Result<String> {
        let mut full: Vec<OsString> = vec!["api".into(), "--hostname".into(), slug.host.as_str().into()];
        full.extend(args.iter().map(OsString::from));
        self.gh(full)
    }
}

impl Default for GhCli {
    fn default() -> Self {
        Self::new(Self::TOOL)
    }
}

impl RemoteHost for GhCli {
    #[instrument(skip(self), level = "debug")]
    fn default_branch(&self, slug: &RepoSlug) -> Result<String> {
        let branch = self.gh(vec![
            "repo".into(),
            "view".into(),
            slug.gh_spec().into(),
            "--json".into(),
            "defaultBranchRef".into(),
            "--jq".into(),
            ".defaultBranchRef.name".into(),
        ])?;
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(RemoteError::NoDefaultBranch { slug: slug.clone() });
        }

        debug!("default branch of {slug} is {branch}");
        Ok(branch.to_string())
    }

    #[instrument(skip(self), level = "debug")]
    fn set_default_branch(&self, slug: &RepoSlug, branch: &str) -> Result<()> {
        self.gh(vec![
            "repo".into(),
            "edit".into(),
            slug.gh_spec().into(),
            "--default-branch".into(),
            branch.into(),
        ])?;

        Ok(())
    }

    fn branches(&self, slug: &RepoSlug) -> Result<Vec<String>> {
        let path = format!("{}/branches", slug.api_path());
        let output = self.api(slug, &["--paginate", path.as_str(), "--jq", ".[].name"])?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    #[instrument(skip(self), level = "debug")]
    fn delete_branch(&self, slug: &RepoSlug, branch: &str) -> Result<()> {
        let path = format!("{}/git/refs/heads/{branch}", slug.api_path());
        self.api(slug, &["-X", "DELETE", path.as_str()])?;

        Ok(())
    }
}

/// Hosting service error types.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// URL does not point at a hosted repository.
    #[error("cannot determine owner and repository from {url:?}")]
    InvalidUrl { url: String },

    /// Service reports no default branch.
    #[error("{slug} has no default branch")]
    NoDefaultBranch { slug: RepoSlug },

    /// Hosting client fails.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = RemoteError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("https://github.com/awkless/spillway.git"; "https with suffix")]
    #[test_case("https://github.com/awkless/spillway"; "https without suffix")]
    #[test_case("https://token@github.com/awkless/spillway/"; "https with credentials")]
    #[test_case("git@github.com:awkless/spillway.git"; "scp like")]
    #[test_case("ssh://git@github.com:22/awkless/spillway.git"; "ssh with port")]
    #[test]
    fn repo_slug_parses_clone_urls(url: &str) {
        let slug = RepoSlug::parse(url).unwrap();
        pretty_assertions::assert_eq!(
            slug,
            RepoSlug {
                host: "github.com".into(),
                owner: "awkless".into(),
                name: "spillway".into(),
            }
        );
    }

    #[test_case(""; "empty")]
    #[test_case("spillway"; "bare name")]
    #[test_case("https://github.com/spillway"; "no owner")]
    #[test_case("git@github.com:"; "no path")]
    #[test]
    fn repo_slug_rejects_bad_urls(url: &str) {
        assert!(matches!(
            RepoSlug::parse(url),
            Err(RemoteError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn repo_slug_public_url_and_gh_spec() -> Result<()> {
        let slug: RepoSlug = "git@github.com:awkless/spillway.git".parse()?;
        assert_eq!(slug.public_url(), "https://github.com/awkless/spillway");
        assert_eq!(slug.gh_spec(), "awkless/spillway");

        let slug: RepoSlug = "https://git.corp.example/team/app".parse()?;
        assert_eq!(slug.gh_spec(), "git.corp.example/team/app");
        Ok(())
    }
}
