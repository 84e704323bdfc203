// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remove leaked content from git history.
//!
//! Spillway drives two remediation flows:
//!
//! 1. __History cleanup__, see [`rewrite`]. Removes a file, a directory, glob
//!    matches, a literal secret, or AI-assistant artifacts from every commit
//!    of a repository, after bundling all refs into a backup.
//! 2. __Contributor reindex__, see [`reindex`]. Strips attribution trailers
//!    from commit messages of a hosted repository, then makes the hosting
//!    service recompute its contributor list.
//!
//! Neither flow rewrites commits itself. History rewriting is delegated to
//! [git-filter-repo](https://github.com/newren/git-filter-repo), and the
//! hosting service is driven through its command-line client.

pub mod config;
pub mod path;
pub mod pattern;
pub mod prompt;
pub mod reindex;
pub mod rewrite;
pub mod syscall;
pub mod vcs;
