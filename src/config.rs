// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file that spillway reads at start up.
//! Settings are loaded exactly once per process and then handed to every
//! component by reference. Nothing in spillway mutates them afterwards.
//!
//! # General Layout
//!
//! ```toml
//! backup_dir = "~/.git-backups"
//! redaction = "***REMOVED***"
//! ai_patterns = [".claude/", "CLAUDE.md"]
//! sensitive_patterns = [".env", "*.pem"]
//!
//! [reindex]
//! placeholder_branch = "spillway-reindex"
//! identity_marker = "claude"
//! settle_seconds = 15
//! host = "github.com"
//! ```
//!
//! Leave `host` unset unless clone URLs use an SSH host alias. The host of
//! the clone URL is used otherwise.
//!
//! Every field is optional. Missing fields fall back to built-in defaults.

use crate::{path::default_backup_dir, pattern::PathPattern};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::{debug, instrument};

/// Known AI-assistant artifact patterns.
///
/// These go stale as new assistants show up. Override them through the
/// `ai_patterns` setting instead of editing this list.
pub const DEFAULT_AI_PATTERNS: &[&str] = &[
    ".claude/",
    "CLAUDE.md",
    ".cursor/",
    ".cursorrules",
    ".aider*",
    ".github/copilot-instructions.md",
    ".windsurfrules",
    ".windsurf/",
    ".continue/",
    ".codeium/",
    ".tabnine/",
    ".gemini/",
    "GEMINI.md",
    "AGENTS.md",
    ".codex/",
    ".clinerules",
    ".roo/",
];

/// Known sensitive file patterns reported by list mode.
pub const DEFAULT_SENSITIVE_PATTERNS: &[&str] = &[
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
    "*.p12",
    "*.pfx",
    "*.keystore",
    "id_rsa*",
    "id_ed25519*",
    "credentials*",
    "secrets.*",
    ".npmrc",
    ".pypirc",
    ".netrc",
    ".aws/",
    ".ssh/",
];

/// Spillway settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Directory that receives backup bundles.
    pub backup_dir: PathBuf,

    /// Marker that replaces redacted literals.
    pub redaction: String,

    /// AI-assistant artifact patterns removed by `--ai`.
    pub ai_patterns: Vec<PathPattern>,

    /// Sensitive file patterns reported by `--list`.
    pub sensitive_patterns: Vec<PathPattern>,

    /// Contributor reindex settings.
    pub reindex: ReindexSettings,
}

impl Settings {
    /// Load settings from file at target path.
    ///
    /// Falls back to built-in defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if settings file exists but cannot be
    ///   read.
    /// - Return [`ConfigError::Deserialize`] if settings are malformed.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no settings at {:?}, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("load settings from {:?}", path.display());
        read_to_string(path)
            .map_err(|source| ConfigError::Read {
                source,
                path: path.to_path_buf(),
            })?
            .parse()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir().unwrap_or_else(|_| PathBuf::from(".git-backups")),
            redaction: "***REMOVED***".into(),
            ai_patterns: builtin_patterns(DEFAULT_AI_PATTERNS),
            sensitive_patterns: builtin_patterns(DEFAULT_SENSITIVE_PATTERNS),
            reindex: ReindexSettings::default(),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on backup directory field.
        settings.backup_dir = PathBuf::from(
            shellexpand::full(settings.backup_dir.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        );

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Contributor reindex settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReindexSettings {
    /// Reserved branch name used as temporary remote default branch.
    pub placeholder_branch: String,

    /// Identity whose attribution gets stripped and verified.
    pub identity_marker: String,

    /// Seconds to wait for the hosting service before verification.
    pub settle_seconds: u64,

    /// Hosting service of repository.
    ///
    /// Takes precedence over host of clone URL when set, for clone URLs that
    /// use an SSH alias.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ReindexSettings {
    /// Settle delay as [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_seconds)
    }
}

impl Default for ReindexSettings {
    fn default() -> Self {
        Self {
            placeholder_branch: "spillway-reindex".into(),
            identity_marker: "claude".into(),
            settle_seconds: 15,
            host: None,
        }
    }
}

fn builtin_patterns(raw: &[&str]) -> Vec<PathPattern> {
    raw.iter()
        .filter_map(|pattern| PathPattern::new(*pattern).ok())
        .collect()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
