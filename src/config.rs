//! Command line configuration.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;

/// Placeholder used when the source branch cannot be determined.
pub const UNKNOWN_BRANCH: &str = "unknown";

/// Placeholder used when `GITHUB_REPOSITORY` is not set.
pub const UNKNOWN_REPOSITORY: &str = "unknown/unknown";

/// Command line configuration for docbranch.
#[derive(Debug, Clone, Parser)]
#[command(name = "docbranch", version, about, long_about = None)]
pub struct Config {
    /// Repository path
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Output directory, relative to the repository path unless absolute
    #[arg(short, long, default_value = "html_output")]
    pub output: PathBuf,

    /// Branch receiving the rendered site
    #[arg(long, default_value = "docs")]
    pub branch: String,

    /// Remote to publish to
    #[arg(long, default_value = "origin")]
    pub remote: String,

    /// Additional directory names to skip while scanning
    #[arg(long = "exclude", value_name = "DIR")]
    pub excludes: Vec<String>,

    /// External converter reading Markdown on stdin and writing HTML to stdout
    #[arg(long, value_name = "PROGRAM")]
    pub renderer: Option<PathBuf>,

    /// Argument passed to the external converter (repeatable)
    #[arg(long = "renderer-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub renderer_args: Vec<String>,

    /// Branch name recorded in the commit message
    #[arg(long, env = "GITHUB_REF_NAME")]
    pub source_branch: Option<String>,

    /// Access token used to authenticate the push
    #[arg(long, env = "PERSONAL_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Repository identifier (owner/name) used to build the push URL
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    /// Host serving the repository
    #[arg(long, default_value = "github.com")]
    pub host: String,

    /// Push URL overriding the token-authenticated one
    #[arg(long, env = "DOCBRANCH_REMOTE_URL", hide_env_values = true)]
    pub remote_url: Option<String>,

    /// Committer name on the docs branch
    #[arg(long, default_value = "GitHub Action")]
    pub user_name: String,

    /// Committer email on the docs branch
    #[arg(long, default_value = "action@github.com")]
    pub user_email: String,

    /// Render only, skip the branch switch and push
    #[arg(long)]
    pub no_publish: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parses configuration from command line arguments and environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Validates configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the repository path does not exist, or if it is not
    /// inside a git working tree while publishing is enabled.
    pub fn validate(&self) -> Result<()> {
        if !self.root.exists() {
            bail!("Repository path does not exist: {}", self.root.display());
        }

        if self.branch.trim().is_empty() {
            bail!("Docs branch name must not be empty");
        }

        if !self.no_publish {
            crate::git::discover_workdir(&self.root)?;
        }

        Ok(())
    }

    /// Output directory resolved against the repository path.
    pub fn output_dir(&self) -> PathBuf {
        if self.output.is_absolute() {
            self.output.clone()
        } else {
            self.root.join(&self.output)
        }
    }

    /// Repository identifier, degrading to a placeholder when unset.
    pub fn repository_or_placeholder(&self) -> &str {
        self.repository
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(UNKNOWN_REPOSITORY)
    }
}
