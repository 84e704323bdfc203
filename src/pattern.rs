// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path patterns for built-in pattern lists.
//!
//! The sensitive-file list and the AI-assistant artifact list are written as
//! short patterns like `*.pem`, `.claude/`, or `.github/copilot-instructions.md`.
//! A __path pattern__ matches historical paths by component, not by raw
//! string:
//!
//! - A pattern ending in `/` names a directory. It matches every path that
//!   lives beneath a directory whose trailing components match the pattern.
//! - Any other pattern names a file. It matches every path whose trailing
//!   components match the pattern.
//! - A leading `/` anchors the pattern to the repository root.
//!
//! Glob wildcards never cross a `/` inside a path pattern, i.e., `*.pem`
//! matches `certs/server.pem` through its final component, but `certs*` does
//! not match `certs/server.pem` as a file pattern.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Component, Path},
    str::FromStr,
};

const COMPONENT_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Component-wise path predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    raw: String,
    glob: Pattern,
    depth: usize,
    directory: bool,
    anchored: bool,
}

impl PathPattern {
    /// Construct new path pattern.
    ///
    /// # Errors
    ///
    /// - Return [`PatternError::Empty`] if pattern has no components.
    /// - Return [`PatternError::Glob`] if pattern is not a valid glob.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let anchored = raw.starts_with('/');
        let directory = raw.ends_with('/');
        let body = raw.trim_matches('/');
        if body.is_empty() {
            return Err(PatternError::Empty);
        }

        let glob = Pattern::new(body).map_err(|source| PatternError::Glob {
            pattern: raw.clone(),
            source,
        })?;
        let depth = body.split('/').filter(|part| !part.is_empty()).count();

        Ok(Self {
            raw,
            glob,
            depth,
            directory,
            anchored,
        })
    }

    /// Pattern as originally written.
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    /// Pattern names a directory.
    pub fn is_directory(&self) -> bool {
        self.directory
    }

    /// Match repository-relative path against pattern.
    pub fn matches(&self, path: impl AsRef<Path>) -> bool {
        let parts = path
            .as_ref()
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>();

        if self.directory {
            // INVARIANT: Only proper ancestors count, the path itself is a file.
            (self.depth..parts.len()).any(|end| self.tail_matches(&parts[..end]))
        } else {
            self.tail_matches(&parts)
        }
    }

    fn tail_matches(&self, parts: &[&str]) -> bool {
        if parts.len() < self.depth || (self.anchored && parts.len() != self.depth) {
            return false;
        }

        let tail = parts[parts.len() - self.depth..].join("/");
        self.glob.matches_with(&tail, COMPONENT_MATCH)
    }
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::new(data)
    }
}

impl TryFrom<String> for PathPattern {
    type Error = PatternError;

    fn try_from(data: String) -> Result<Self, Self::Error> {
        Self::new(data)
    }
}

impl From<PathPattern> for String {
    fn from(pattern: PathPattern) -> Self {
        pattern.raw
    }
}

impl Display for PathPattern {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Path pattern error types.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// Pattern has nothing to match against.
    #[error("path pattern cannot be empty")]
    Empty,

    /// Pattern is not a valid glob.
    #[error("invalid path pattern {pattern:?}")]
    Glob {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PatternError> = std::result::Result<T, E>;
