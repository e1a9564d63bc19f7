//! Git working tree access through the `git` executable

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::domain::DomainError;

/// Handle on a local git working tree
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    /// Whether a usable `git` executable is on the PATH
    pub async fn is_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Opens an existing working tree
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let repo = Self { root: root.into() };
        repo.run(&["rev-parse", "--git-dir"]).await?;
        Ok(repo)
    }

    /// Initializes a repository whose first commit lands on `branch`
    pub async fn init(root: impl Into<PathBuf>, branch: &str) -> Result<Self, DomainError> {
        let repo = Self { root: root.into() };
        repo.run(&["init", "--quiet"]).await?;
        repo.run(&["symbolic-ref", "HEAD", &format!("refs/heads/{}", branch)])
            .await?;
        repo.run(&["config", "user.name", "ml-metadata-sync"]).await?;
        repo.run(&["config", "user.email", "ml-metadata-sync@localhost"])
            .await?;
        repo.run(&["config", "commit.gpgsign", "false"]).await?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn add_all(&self) -> Result<(), DomainError> {
        self.run(&["add", "--all"]).await.map(|_| ())
    }

    pub async fn add(&self, path: &Path) -> Result<(), DomainError> {
        let path = path.to_string_lossy();
        self.run(&["add", "--", &path]).await.map(|_| ())
    }

    /// Commits tracked modifications and deletions (`git commit -a`)
    pub async fn commit_all(&self, message: &str) -> Result<(), DomainError> {
        self.run(&["commit", "--quiet", "-a", "-m", message])
            .await
            .map(|_| ())
    }

    /// Commits whatever is staged
    pub async fn commit(&self, message: &str) -> Result<(), DomainError> {
        self.run(&["commit", "--quiet", "-m", message])
            .await
            .map(|_| ())
    }

    /// Commits tracked modifications when there are any; returns whether it did
    pub async fn commit_all_if_changed(&self, message: &str) -> Result<bool, DomainError> {
        if !self.has_changes().await? {
            return Ok(false);
        }
        self.commit_all(message).await?;
        Ok(true)
    }

    /// Whether tracked files differ from HEAD
    pub async fn has_changes(&self) -> Result<bool, DomainError> {
        let status = self
            .run(&["status", "--porcelain", "--untracked-files=no"])
            .await?;
        Ok(!status.is_empty())
    }

    /// Folds tracked changes into the last commit
    pub async fn amend(&self) -> Result<(), DomainError> {
        self.run(&["commit", "--quiet", "-a", "--amend", "--no-edit"])
            .await
            .map(|_| ())
    }

    pub async fn head_commit(&self) -> Result<String, DomainError> {
        self.run(&["rev-parse", "HEAD"]).await
    }

    pub async fn current_branch(&self) -> Result<String, DomainError> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// Files deleted along the history of HEAD, as `(deleting commit, path)`.
    ///
    /// Paths are relative to the top of the working tree. Renames are
    /// reported as a deletion of the old path.
    pub async fn deleted_files(&self) -> Result<Vec<(String, String)>, DomainError> {
        let log = self
            .run(&[
                "-c",
                "core.quotepath=off",
                "log",
                "--no-renames",
                "--diff-filter=D",
                "--name-only",
                "--format=commit %H",
                "HEAD",
            ])
            .await?;

        let mut commit: Option<&str> = None;
        let mut files = Vec::new();
        for line in log.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match (line.strip_prefix("commit "), commit) {
                (Some(sha), _) => commit = Some(sha),
                (None, Some(sha)) => files.push((sha.to_string(), line.to_string())),
                (None, None) => {}
            }
        }
        Ok(files)
    }

    /// Contents of `path` at `revision`
    pub async fn show_file(&self, revision: &str, path: &str) -> Result<String, DomainError> {
        self.run(&["show", &format!("{}:{}", revision, path)]).await
    }

    async fn run(&self, args: &[&str]) -> Result<String, DomainError> {
        debug!(root = %self.root.display(), ?args, "git");

        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .await
            .map_err(|e| DomainError::git(format!("Failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DomainError::git(format!(
                "git {} failed (status {:?}): {}",
                args.join(" "),
                output.status.code(),
                stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
