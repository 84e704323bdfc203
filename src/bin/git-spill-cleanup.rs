// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use spillway::{
    config::Settings,
    path::default_settings_path,
    prompt::prompter,
    rewrite::{
        filter::FilterRepo,
        precondition::{open_repository, require_tool},
        target::{resolve, Action, ActionFlags},
        Cleanup, RunOptions,
    },
};

use anyhow::Result;
use clap::{ArgGroup, Parser};
use std::{env::current_dir, path::PathBuf, process::exit};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about = "Remove files, secrets, and AI-assistant artifacts from git history",
    override_usage = "git-spill-cleanup [options] <action>",
    version,
    group(ArgGroup::new("action").multiple(false).args(
        ["file", "directory", "pattern", "string", "regex", "list", "ai"]
    ))
)]
struct Cli {
    /// Remove one file from all history.
    #[arg(short, long, value_name = "path")]
    pub file: Option<PathBuf>,

    /// Remove directory and everything beneath it from all history.
    #[arg(short, long, value_name = "path")]
    pub directory: Option<PathBuf>,

    /// Remove every path matching glob from all history.
    #[arg(short, long, value_name = "glob")]
    pub pattern: Option<String>,

    /// Replace literal text in every file of all history.
    #[arg(short, long, value_name = "literal")]
    pub string: Option<String>,

    /// Replace regular expression matches (not implemented).
    #[arg(short, long, value_name = "pattern")]
    pub regex: Option<String>,

    /// List sensitive files and AI-assistant artifacts in history.
    #[arg(short, long)]
    pub list: bool,

    /// Back up all refs, alone or before another action.
    #[arg(short, long)]
    pub backup: bool,

    /// Remove AI-assistant artifacts from all history.
    #[arg(short, long)]
    pub ai: bool,

    /// Skip backup before rewriting history (dangerous).
    #[arg(long, conflicts_with = "backup")]
    pub no_backup: bool,

    /// Report what would be removed without changing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,

    /// Path to settings file.
    #[arg(short, long, value_name = "path", env = "SPILLWAY_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    fn flags(&self) -> ActionFlags {
        ActionFlags {
            file: self.file.clone(),
            directory: self.directory.clone(),
            pattern: self.pattern.clone(),
            string: self.string.clone(),
            regex: self.regex.clone(),
            list: self.list,
            backup: self.backup,
            ai: self.ai,
        }
    }

    fn run(self) -> Result<()> {
        let settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::load(default_settings_path()?)?,
        };

        let action = resolve(self.flags(), &settings)?;
        let repo = open_repository(current_dir()?)?;

        // INVARIANT: Bundling needs the git binary, rewrites check for their own tool.
        if action == Action::BackupOnly && !self.dry_run {
            require_tool("git")?;
        }

        let filter = FilterRepo::default();
        let cleanup = Cleanup::new(&settings, &repo, &filter);
        let options = RunOptions {
            dry_run: self.dry_run,
            no_backup: self.no_backup,
        };

        let mut prompter = prompter(self.yes);
        let outcome = cleanup.run(action, options, prompter.as_mut())?;
        print!("{outcome}");

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let code = if error.use_stderr() { 1 } else { 0 };
            let _ = error.print();
            exit(code);
        }
    };

    if let Err(error) = cli.run() {
        eprintln!("ERROR: {error:#}");
        exit(1);
    }

    exit(0)
}
