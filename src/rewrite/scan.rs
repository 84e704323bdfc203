// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Read-only history scan.
//!
//! List mode reports every historical path that matches a sensitive file
//! pattern or an AI-assistant artifact pattern, grouped by the pattern that
//! caught it. It never mutates anything, so operators can review the report
//! before deciding what to remove.

use crate::{
    config::Settings,
    pattern::PathPattern,
    vcs::{VcsError, VersionControl},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{info, instrument};

/// Why a pattern is scanned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Sensitive,
    AiArtifact,
}

impl Display for Category {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Sensitive => fmt.write_str("sensitive"),
            Self::AiArtifact => fmt.write_str("ai artifact"),
        }
    }
}

/// Historical paths caught by one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternGroup {
    pub category: Category,
    pub pattern: PathPattern,
    pub paths: Vec<PathBuf>,
}

/// Result of list mode.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub groups: Vec<PatternGroup>,
}

impl ScanReport {
    /// Number of distinct paths reported.
    pub fn path_count(&self) -> usize {
        let mut paths = self
            .groups
            .iter()
            .flat_map(|group| group.paths.iter())
            .collect::<Vec<_>>();
        paths.sort();
        paths.dedup();
        paths.len()
    }

    /// Nothing suspicious in history.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Display for ScanReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.is_empty() {
            return writeln!(fmt, "No sensitive files or ai artifacts found in history.");
        }

        for group in &self.groups {
            writeln!(
                fmt,
                "[{}] {} ({} paths)",
                group.category,
                group.pattern,
                group.paths.len()
            )?;
            for path in &group.paths {
                writeln!(fmt, "    {}", path.display())?;
            }
        }

        writeln!(
            fmt,
            "\n{} paths in history match a pattern. Review them before removing anything.",
            self.path_count()
        )
    }
}

/// Scan history for sensitive and AI-assistant paths.
///
/// History is walked once. Each path is then reported under every pattern
/// that matches it. Patterns without matches are left out.
///
/// # Errors
///
/// - Return [`VcsError`] if history cannot be read.
#[instrument(skip(vcs, settings), level = "debug")]
pub fn scan(vcs: &impl VersionControl, settings: &Settings) -> Result<ScanReport, VcsError> {
    let patterns = settings
        .sensitive_patterns
        .iter()
        .map(|pattern| (Category::Sensitive, pattern))
        .chain(
            settings
                .ai_patterns
                .iter()
                .map(|pattern| (Category::AiArtifact, pattern)),
        )
        .collect::<Vec<_>>();

    info!("scan history of {} for {} patterns", vcs.name(), patterns.len());
    let paths = vcs.paths_ever_added(&|path| patterns.iter().any(|(_, pattern)| pattern.matches(path)))?;

    let groups = patterns
        .into_iter()
        .filter_map(|(category, pattern)| {
            let matched = paths
                .iter()
                .filter(|path| pattern.matches(path))
                .cloned()
                .collect::<Vec<_>>();
            (!matched.is_empty()).then(|| PatternGroup {
                category,
                pattern: pattern.clone(),
                paths: matched,
            })
        })
        .collect();

    Ok(ScanReport { groups })
}
