// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{has_tool, require_tools, RepoFixture};

use spillway::{
    config::Settings,
    prompt::AssumeYes,
    rewrite::{
        filter::FilterRepo,
        precondition::{open_repository, PreconditionError},
        scan::{scan, Category},
        target::{resolve, ActionFlags},
        Cleanup, Outcome, RewriteError, RunOptions,
    },
    vcs::{GitRepository, Remote, VersionControl},
};

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::{
    collections::BTreeSet,
    fs::read_dir,
    path::{Path, PathBuf},
};

fn settings(fixture: &RepoFixture) -> Settings {
    Settings {
        backup_dir: fixture.backup_dir(),
        ..Default::default()
    }
}

fn history(repo: &GitRepository) -> Result<BTreeSet<PathBuf>> {
    Ok(repo.paths_ever_added(&|_| true)?)
}

fn backups(fixture: &RepoFixture) -> usize {
    read_dir(fixture.backup_dir())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[test]
fn paths_ever_added_includes_deleted_files() -> Result<()> {
    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("README.md", "# project")?;
    fixture.stage_and_commit("secret.env", "TOKEN=hunter2")?;
    fixture.remove_and_commit("secret.env")?;

    let repo = GitRepository::discover(fixture.root())?;
    let paths = history(&repo)?;
    assert_eq!(
        paths,
        BTreeSet::from([PathBuf::from("README.md"), PathBuf::from("secret.env")])
    );

    let env_only = repo.paths_ever_added(&|path| path.extension().is_some_and(|ext| ext == "env"))?;
    assert_eq!(env_only, BTreeSet::from([PathBuf::from("secret.env")]));
    Ok(())
}

#[test]
fn discover_from_subdirectory_finds_root() -> Result<()> {
    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("src/lib.rs", "pub fn x() {}")?;

    let repo = open_repository(fixture.root().join("src"))?;
    assert_eq!(repo.name(), "project");
    Ok(())
}

#[test]
fn state_reports_dirty_tree_and_branch() -> Result<()> {
    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("README.md", "# project")?;

    let repo = GitRepository::discover(fixture.root())?;
    let state = repo.state()?;
    assert!(state.clean);
    assert_eq!(state.current_branch.as_deref(), Some("main"));

    fixture.write("README.md", "# changed")?;
    assert!(!repo.state()?.clean);
    Ok(())
}

#[test]
fn untracked_files_keep_tree_clean() -> Result<()> {
    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("README.md", "# project")?;
    fixture.write("scratch.txt", "notes")?;

    let repo = GitRepository::discover(fixture.root())?;
    assert!(repo.state()?.clean);
    Ok(())
}

#[test]
fn restore_remotes_only_adds_missing() -> Result<()> {
    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("README.md", "# project")?;
    fixture.add_remote("origin", "https://github.com/awkless/project.git")?;
    fixture.add_remote("mirror", "https://git.example.org/awkless/project.git")?;

    let repo = GitRepository::discover(fixture.root())?;
    let before = repo.remotes()?;
    fixture.delete_remote("origin")?;

    let restored = repo.restore_remotes(&before)?;
    assert_eq!(
        restored,
        vec![Remote {
            name: "origin".into(),
            url: "https://github.com/awkless/project.git".into(),
        }]
    );
    assert_eq!(repo.remotes()?.len(), 2);
    Ok(())
}

#[test]
fn scan_groups_historical_paths() -> Result<()> {
    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("README.md", "# project")?;
    fixture.stage_and_commit("api/.env", "KEY=1")?;
    fixture.stage_and_commit(".claude/settings.json", "{}")?;
    fixture.remove_and_commit(".claude/settings.json")?;

    let repo = GitRepository::discover(fixture.root())?;
    let report = scan(&repo, &settings(&fixture))?;

    let groups = report
        .groups
        .iter()
        .map(|group| (group.category, group.pattern.to_string(), group.paths.clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        groups,
        vec![
            (Category::Sensitive, ".env".to_string(), vec![PathBuf::from("api/.env")]),
            (
                Category::AiArtifact,
                ".claude/".to_string(),
                vec![PathBuf::from(".claude/settings.json")]
            ),
        ]
    );
    Ok(())
}

#[test]
fn backup_only_bundles_all_refs() -> Result<()> {
    if !has_tool("git") {
        eprintln!("skipped: git not on PATH");
        return Ok(());
    }

    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("README.md", "# project")?;
    let settings = settings(&fixture);
    let repo = GitRepository::discover(fixture.root())?;
    let filter = FilterRepo::default();
    let cleanup = Cleanup::new(&settings, &repo, &filter);

    let action = resolve(
        ActionFlags {
            backup: true,
            ..Default::default()
        },
        &settings,
    )?;
    let outcome = cleanup.run(action, RunOptions::default(), &mut AssumeYes)?;

    match outcome {
        Outcome::Backup(handle) => {
            assert!(handle.path().exists());
            assert!(handle.path().starts_with(fixture.backup_dir()));
            let name = handle.path().file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("project_"));
            assert!(name.ends_with(".bundle"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    Ok(())
}

#[test]
fn commits_containing_finds_literal() -> Result<()> {
    if !has_tool("git") {
        eprintln!("skipped: git not on PATH");
        return Ok(());
    }

    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("README.md", "# project")?;
    fixture.stage_and_commit("config.toml", "token = \"hunter2\"")?;

    let repo = GitRepository::discover(fixture.root())?;
    assert_eq!(repo.commits_containing("hunter2")?.len(), 1);
    assert!(repo.commits_containing("not-in-history")?.is_empty());
    Ok(())
}

#[test]
fn dirty_tree_blocks_rewrite_without_backup() -> Result<()> {
    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("secret.env", "TOKEN=hunter2")?;
    fixture.write("secret.env", "TOKEN=changed")?;

    let settings = settings(&fixture);
    let repo = GitRepository::discover(fixture.root())?;
    let filter = FilterRepo::default();
    let cleanup = Cleanup::new(&settings, &repo, &filter);

    let action = resolve(
        ActionFlags {
            file: Some("secret.env".into()),
            ..Default::default()
        },
        &settings,
    )?;
    let result = cleanup.run(action, RunOptions::default(), &mut AssumeYes);

    assert!(matches!(
        result,
        Err(RewriteError::Precondition(PreconditionError::DirtyTree { .. }))
    ));
    assert_eq!(backups(&fixture), 0);
    Ok(())
}

#[test]
#[ignore = "needs git and git-filter-repo on PATH"]
fn file_removal_leaves_no_trace_in_history() -> Result<()> {
    require_tools(&["git", FilterRepo::TOOL]);

    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("README.md", "# project")?;
    fixture.stage_and_commit("secret.env", "TOKEN=hunter2")?;
    fixture.stage_and_commit("src/main.rs", "fn main() {}")?;
    fixture.add_remote("origin", "https://github.com/awkless/project.git")?;

    let settings = settings(&fixture);
    let repo = GitRepository::discover(fixture.root())?;
    let filter = FilterRepo::default();
    let cleanup = Cleanup::new(&settings, &repo, &filter);
    let action = resolve(
        ActionFlags {
            file: Some("secret.env".into()),
            ..Default::default()
        },
        &settings,
    )?;
    cleanup.run(action, RunOptions::default(), &mut AssumeYes)?;

    let repo = GitRepository::discover(fixture.root())?;
    let paths = history(&repo)?;
    assert!(!paths.contains(Path::new("secret.env")));
    assert!(paths.contains(Path::new("src/main.rs")));
    assert_eq!(backups(&fixture), 1);
    assert!(repo.remotes()?.iter().any(|remote| remote.name == "origin"));
    Ok(())
}

#[test]
#[ignore = "needs git and git-filter-repo on PATH"]
fn ai_removal_twice_reports_nothing_found() -> Result<()> {
    require_tools(&["git", FilterRepo::TOOL]);

    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("README.md", "# project")?;
    fixture.stage_and_commit("CLAUDE.md", "be nice")?;
    fixture.stage_and_commit(".cursor/rules.md", "be terse")?;

    let settings = settings(&fixture);
    let action = resolve(
        ActionFlags {
            ai: true,
            ..Default::default()
        },
        &settings,
    )?;
    let filter = FilterRepo::default();

    let repo = GitRepository::discover(fixture.root())?;
    Cleanup::new(&settings, &repo, &filter).run(action.clone(), RunOptions::default(), &mut AssumeYes)?;

    let repo = GitRepository::discover(fixture.root())?;
    let second = Cleanup::new(&settings, &repo, &filter).run(action, RunOptions::default(), &mut AssumeYes)?;
    match second {
        Outcome::Rewrite(result) => {
            assert_eq!(result.matched, 0);
            assert_eq!(result.advisories, ["No ai artifacts found in history."]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(history(&repo)?, BTreeSet::from([PathBuf::from("README.md")]));
    Ok(())
}

#[test]
fn dry_run_leaves_history_alone() -> Result<()> {
    let fixture = RepoFixture::new()?;
    fixture.stage_and_commit("build/app.o", "\x7fELF")?;
    fixture.stage_and_commit("src/main.rs", "fn main() {}")?;

    let settings = settings(&fixture);
    let repo = GitRepository::discover(fixture.root())?;
    let filter = FilterRepo::new("spillway-must-not-run");
    let action = resolve(
        ActionFlags {
            directory: Some("build".into()),
            ..Default::default()
        },
        &settings,
    )?;
    let outcome = Cleanup::new(&settings, &repo, &filter).run(
        action,
        RunOptions {
            dry_run: true,
            ..Default::default()
        },
        &mut AssumeYes,
    )?;

    match outcome {
        Outcome::Rewrite(result) => {
            assert!(result.dry_run);
            assert_eq!(result.matches, ["build/app.o"]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(history(&repo)?.len(), 2);
    assert_eq!(backups(&fixture), 0);
    Ok(())
}
