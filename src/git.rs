//! Git repository operations.
//!
//! Repository discovery goes through gix. Everything that mutates the
//! working tree, the index or a remote shells out to the git CLI so the
//! exact command sequence stays visible in the logs.

use anyhow::{Context, Result, bail};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Locates the working tree root containing `path`.
///
/// # Errors
///
/// Returns error if `path` is not inside a git repository, or the repository
/// is bare.
pub fn discover_workdir(path: impl AsRef<Path>) -> Result<PathBuf> {
    let repo = gix::discover(path.as_ref()).with_context(|| {
        format!(
            "Failed to find a git repository at {}",
            path.as_ref().display()
        )
    })?;

    repo.work_dir().map(Path::to_path_buf).with_context(|| {
        format!(
            "Repository at {} has no working tree",
            path.as_ref().display()
        )
    })
}

/// Thin wrapper running git subcommands in one working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    /// Creates runner for the given working directory.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Working directory all commands run in.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Runs git with arguments and returns trimmed stdout.
    ///
    /// # Errors
    ///
    /// Returns error if git cannot be spawned or exits with non-zero status.
    /// The error message carries git's stderr.
    pub fn run<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args
            .into_iter()
            .map(|a| a.as_ref().to_os_string())
            .collect();
        let display = args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");

        self.exec(&args, &display)
    }

    /// Runs git, logging and reporting `display` instead of the arguments.
    fn exec(&self, args: &[OsString], display: &str) -> Result<String> {
        let command = display;
        debug!(command = %command, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("Failed to spawn git {}", display))?;

        if !output.status.success() {
            bail!(
                "git {} failed ({}): {}",
                display,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Name of the checked out branch, or None on a detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let name = self.run(["branch", "--show-current"])?;
        Ok(if name.is_empty() { None } else { Some(name) })
    }

    /// Whether `remote` advertises a head named `branch`.
    pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        let refs = self.run(["ls-remote", "--heads", remote, branch])?;
        let wanted = format!("refs/heads/{}", branch);
        Ok(refs
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .any(|name| name == wanted))
    }

    pub fn fetch(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(["fetch", remote, branch]).map(drop)
    }

    /// Checks out `branch`, creating or resetting it to `start`.
    ///
    /// The trailing `--` keeps git from reading the branch name as a path
    /// when a file or directory of the same name exists.
    pub fn checkout_reset(&self, branch: &str, start: &str) -> Result<()> {
        self.run(["checkout", "-B", branch, start, "--"]).map(drop)
    }

    pub fn checkout_orphan(&self, branch: &str) -> Result<()> {
        self.run(["checkout", "--orphan", branch]).map(drop)
    }

    /// Removes every tracked file from the index and the working tree.
    pub fn remove_all_tracked(&self) -> Result<()> {
        self.run(["rm", "-rf", "--ignore-unmatch", "--quiet", "."])
            .map(drop)
    }

    pub fn add<I, S>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut args = vec![OsString::from("add")];
        args.extend(paths.into_iter().map(|p| p.as_ref().to_os_string()));
        self.run(args).map(drop)
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.run(["commit", "--quiet", "-m", message]).map(drop)
    }

    /// Sets a repository local configuration value.
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.run(["config", key, value]).map(drop)
    }

    /// Whether the index or working tree differs from HEAD.
    pub fn has_changes(&self) -> Result<bool> {
        Ok(!self.run(["status", "--porcelain"])?.is_empty())
    }

    /// Points `remote` at `url`; the URL is kept out of logs and errors
    /// since it may embed a token.
    pub fn set_remote_url(&self, remote: &str, url: &str) -> Result<()> {
        let args: Vec<OsString> = ["remote", "set-url", remote, url]
            .iter()
            .map(OsString::from)
            .collect();
        self.exec(&args, &format!("remote set-url {} <redacted>", remote))
            .map(drop)
    }

    pub fn force_push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(["push", "--force", remote, branch]).map(drop)
    }
}
