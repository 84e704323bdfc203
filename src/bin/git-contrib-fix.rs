// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use spillway::{
    config::Settings,
    path::default_settings_path,
    prompt::prompter,
    reindex::{
        remote::{GhCli, RepoSlug},
        verify::HttpVerifier,
        workspace::TempClone,
        ReindexRequest, Reindexer,
    },
    rewrite::{
        filter::FilterRepo,
        precondition::{open_repository, require_tool},
    },
    vcs::VersionControl,
};

use anyhow::{anyhow, Result};
use clap::Parser;
use indicatif::ProgressBar;
use std::{env::current_dir, path::PathBuf, process::exit};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about = "Strip AI attribution from a hosted repository and refresh its contributor list",
    override_usage = "git-contrib-fix [options] [repo_url] [branch]",
    version
)]
struct Cli {
    /// Clone URL of repository, defaults to origin of current repository.
    #[arg(value_name = "repo_url")]
    pub url: Option<String>,

    /// Branch to clean, defaults to remote default branch.
    #[arg(value_name = "branch")]
    pub branch: Option<String>,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,

    /// Skip checking the public repository page afterwards.
    #[arg(long)]
    pub no_verify: bool,

    /// Path to settings file.
    #[arg(short, long, value_name = "path", env = "SPILLWAY_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::load(default_settings_path()?)?,
        };

        require_tool("git")?;
        require_tool(GhCli::TOOL)?;
        let filter = FilterRepo::locate()?;

        let url = match self.url {
            Some(url) => url,
            None => origin_url()?,
        };
        let slug = RepoSlug::parse(&url)?;

        let target = match &self.branch {
            Some(branch) => branch.clone(),
            None => "its default branch".into(),
        };
        let question = format!(
            "Rewrite commit messages of {target} on {slug} and force-push? Collaborators will need to re-clone."
        );
        if !prompter(self.yes).confirm(&question, false)? {
            println!("Canceled by operator. No changes made.");
            return Ok(());
        }

        let host = GhCli::default();
        let verifier = HttpVerifier::new()?;
        let reindexer = Reindexer::new(&settings.reindex, &host, &verifier, ProgressBar::new_spinner());
        let request = ReindexRequest {
            url,
            branch: self.branch,
            verify: !self.no_verify,
        };

        let outcome = reindexer
            .run(request, |url| TempClone::clone_from(url, filter))
            .await?;
        print!("{outcome}");

        Ok(())
    }
}

fn origin_url() -> Result<String> {
    let repo = open_repository(current_dir()?)?;
    repo.remotes()?
        .into_iter()
        .find(|remote| remote.name == "origin")
        .map(|remote| remote.url)
        .ok_or_else(|| anyhow!("no repository URL given and current repository has no origin remote"))
}

#[tokio::main]
async fn main() {
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

    if let Err(error) = cli.run().await {
        eprintln!("ERROR: {error:#}");
        exit(1);
    }

    exit(0)
}
