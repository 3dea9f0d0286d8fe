//! Publishing the rendered site to the docs branch.
//!
//! The working tree is shared between the source branch and the docs branch,
//! so the output is copied to a snapshot outside the tree before switching.
//! Git failures abort immediately; there is no switch back to the source
//! branch afterwards.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{Config, UNKNOWN_BRANCH};
use crate::git::{Git, discover_workdir};
use crate::images::IMAGES_DIR;

/// Placeholder keeping otherwise empty directories under version control.
pub const PLACEHOLDER_FILE: &str = ".gitkeep";

/// Commit message of the seed commit on a freshly created docs branch.
pub const SEED_COMMIT_MESSAGE: &str = "Initial docs branch commit";

const SEED_README: &str = "# Documentation\n";

/// Publishes a rendered site directory.
pub trait Publish {
    fn publish(&self, site_dir: &Path) -> Result<PublishOutcome>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A commit was created and pushed.
    Pushed { branch: String, message: String },
    /// The docs branch already matched the rendered site.
    NoChanges,
}

/// Copy of the rendered output that survives the working tree wipe.
#[derive(Debug)]
pub struct Snapshot {
    dir: TempDir,
}

impl Snapshot {
    /// Copies `site_dir` into a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns error if `site_dir` is missing or copying fails.
    pub fn take(site_dir: &Path) -> Result<Self> {
        if !site_dir.is_dir() {
            bail!("Output directory {} does not exist", site_dir.display());
        }

        let dir = TempDir::new().context("Failed to create snapshot directory")?;
        copy_tree(site_dir, dir.path())?;
        debug!(
            "Snapshot of {} stored at {}",
            site_dir.display(),
            dir.path().display()
        );

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Where and how the docs branch is pushed.
#[derive(Debug, Clone, Default)]
pub struct PushTarget {
    pub remote: String,
    pub token: Option<String>,
    pub repository: String,
    pub host: String,
    /// Explicit URL, used verbatim instead of the token URL.
    pub url_override: Option<String>,
}

impl PushTarget {
    /// URL the remote is pointed at before pushing.
    ///
    /// # Errors
    ///
    /// Returns error if no override is configured and no token is available.
    pub fn url(&self) -> Result<String> {
        if let Some(url) = &self.url_override {
            return Ok(url.clone());
        }

        match self.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => Ok(format!(
                "https://x-access-token:{}@{}/{}",
                token, self.host, self.repository
            )),
            None => bail!("PERSONAL_ACCESS_TOKEN not found, cannot push"),
        }
    }
}

/// Publisher driving the git CLI in the repository working tree.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    git: Git,
    branch: String,
    source_branch: Option<String>,
    user_name: String,
    user_email: String,
    target: PushTarget,
}

impl GitPublisher {
    pub fn new(workdir: impl Into<PathBuf>, branch: impl Into<String>, target: PushTarget) -> Self {
        Self {
            git: Git::new(workdir),
            branch: branch.into(),
            source_branch: None,
            user_name: "GitHub Action".to_string(),
            user_email: "action@github.com".to_string(),
            target,
        }
    }

    /// Builds a publisher for the repository containing `config.root`.
    ///
    /// # Errors
    ///
    /// Returns error if the root is not inside a git working tree.
    pub fn from_config(config: &Config) -> Result<Self> {
        let workdir = discover_workdir(&config.root)?;
        let target = PushTarget {
            remote: config.remote.clone(),
            token: config.token.clone(),
            repository: config.repository_or_placeholder().to_string(),
            host: config.host.clone(),
            url_override: config.remote_url.clone(),
        };

        Ok(Self::new(workdir, &config.branch, target)
            .source_branch(config.source_branch.clone())
            .identity(&config.user_name, &config.user_email))
    }

    pub fn source_branch(mut self, name: Option<String>) -> Self {
        self.source_branch = name.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn identity(mut self, name: &str, email: &str) -> Self {
        self.user_name = name.to_string();
        self.user_email = email.to_string();
        self
    }

    /// Source branch for the commit message: configured, then checked out,
    /// then a placeholder.
    fn resolve_source_branch(&self) -> String {
        if let Some(name) = &self.source_branch {
            return name.clone();
        }
        self.git
            .current_branch()
            .ok()
            .flatten()
            .unwrap_or_else(|| UNKNOWN_BRANCH.to_string())
    }

    /// Checks out the docs branch, creating it as a seeded orphan if the
    /// remote does not have it yet.
    fn switch_to_docs_branch(&self) -> Result<()> {
        let remote = &self.target.remote;

        if self.git.remote_branch_exists(remote, &self.branch)? {
            info!("{} branch exists, checking out", self.branch);
            self.git.fetch(remote, &self.branch)?;
            self.git.checkout_reset(&self.branch, "FETCH_HEAD")?;
        } else {
            info!("{} branch doesn't exist, creating it", self.branch);
            self.git.checkout_orphan(&self.branch)?;
            self.git.remove_all_tracked()?;
            fs::write(self.git.workdir().join("README.md"), SEED_README)
                .context("Failed to write seed README")?;
            self.git.add(["README.md"])?;
            self.git.commit(SEED_COMMIT_MESSAGE)?;
        }

        Ok(())
    }
}

impl Publish for GitPublisher {
    fn publish(&self, site_dir: &Path) -> Result<PublishOutcome> {
        let snapshot = Snapshot::take(site_dir)?;
        let source = self.resolve_source_branch();

        self.git.set_config("user.name", &self.user_name)?;
        self.git.set_config("user.email", &self.user_email)?;

        info!("Switching to {} branch...", self.branch);
        self.switch_to_docs_branch()?;

        let workdir = self.git.workdir();
        clear_worktree(workdir)?;
        info!("Copying generated files to {} branch...", self.branch);
        copy_tree(snapshot.path(), workdir)?;
        backfill_empty_image_dirs(workdir)?;
        log_published_tree(workdir);

        self.git.add(["."])?;
        if !self.git.has_changes()? {
            info!("No changes to commit");
            return Ok(PublishOutcome::NoChanges);
        }

        let message = format!("Convert Markdown to HTML from branch {}", source);
        self.git.commit(&message)?;

        info!("Pushing to {} branch...", self.branch);
        let url = self.target.url()?;
        self.git.set_remote_url(&self.target.remote, &url)?;
        self.git.force_push(&self.target.remote, &self.branch)?;
        info!("Successfully pushed to {} branch", self.branch);

        Ok(PublishOutcome::Pushed {
            branch: self.branch.clone(),
            message,
        })
    }
}

/// Recursively copies the contents of `src` into `dst`.
///
/// Directories are recreated even when empty; existing files are
/// overwritten.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .context("Walked entry outside source tree")?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}

/// Deletes everything in `workdir` except the `.git` entry.
pub fn clear_worktree(workdir: &Path) -> Result<()> {
    let entries =
        fs::read_dir(workdir).with_context(|| format!("Failed to list {}", workdir.display()))?;

    for entry in entries {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        let removed = if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.with_context(|| format!("Failed to remove {}", path.display()))?;
    }

    Ok(())
}

/// Adds [`PLACEHOLDER_FILE`] to every empty `images/` directory.
///
/// # Returns
///
/// Directories that received a placeholder.
pub fn backfill_empty_image_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut filled = Vec::new();

    let image_dirs = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.file_name() == IMAGES_DIR);

    for dir in image_dirs {
        let is_empty = fs::read_dir(dir.path())
            .with_context(|| format!("Failed to list {}", dir.path().display()))?
            .next()
            .is_none();
        if is_empty {
            let placeholder = dir.path().join(PLACEHOLDER_FILE);
            fs::write(&placeholder, "")
                .with_context(|| format!("Failed to write {}", placeholder.display()))?;
            filled.push(dir.path().to_path_buf());
        }
    }

    Ok(filled)
}

fn log_published_tree(root: &Path) {
    let entries = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok());

    let mut image_dirs = 0;
    for entry in entries {
        let indent = "  ".repeat(entry.depth() - 1);
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            debug!("{}{}/", indent, name);
            if entry.file_name() == IMAGES_DIR {
                image_dirs += 1;
                info!("Found images directory: {}", entry.path().display());
            }
        } else {
            debug!("{}{}", indent, name);
        }
    }

    if image_dirs == 0 {
        info!("No images directories found");
    }
}
