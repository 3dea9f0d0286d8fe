//! Shared test utilities for integration tests.
//!
//! Provides helpers for creating temporary git repositories, a bare remote
//! they can push to, and files inside them.

#![allow(dead_code)]

use anyhow::Result;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Runs git in `dir` and returns trimmed stdout.
///
/// # Errors
///
/// Returns error if git cannot be spawned or exits with non-zero status.
pub fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git").args(args).current_dir(dir).output()?;

    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Creates temporary git repository with test configuration.
///
/// # Errors
///
/// Returns error if git commands fail or directory creation fails
pub fn create_test_repo() -> Result<TempDir> {
    let dir = TempDir::new()?;
    let path = dir.path();

    git(path, &["init", "--quiet"])?;
    git(path, &["config", "user.name", "Test User"])?;
    git(path, &["config", "user.email", "test@example.com"])?;

    Ok(dir)
}

/// Creates bare repository acting as the remote.
pub fn create_bare_remote() -> Result<TempDir> {
    let dir = TempDir::new()?;
    git(dir.path(), &["init", "--bare", "--quiet"])?;
    Ok(dir)
}

/// Creates a repository with one commit and `origin` pointing at a bare
/// remote. Returns (work repository, remote, source branch name).
pub fn create_repo_with_remote(files: &[(&str, &str)]) -> Result<(TempDir, TempDir, String)> {
    let repo = create_test_repo()?;
    let remote = create_bare_remote()?;
    let remote_path = remote
        .path()
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Remote path is not UTF8"))?;

    for (path, content) in files {
        write_file(repo.path(), path, content)?;
    }
    git(repo.path(), &["add", "."])?;
    git(repo.path(), &["commit", "--quiet", "-m", "Source commit"])?;
    git(repo.path(), &["remote", "add", "origin", remote_path])?;

    let branch = git(repo.path(), &["branch", "--show-current"])?;
    Ok((repo, remote, branch))
}

/// Writes file, creating parent directories as needed.
///
/// # Errors
///
/// Returns error if directory creation or file write fails
pub fn write_file(root: &Path, path: &str, content: &str) -> Result<()> {
    let file_path = root.join(path);
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(file_path, content)?;
    Ok(())
}
