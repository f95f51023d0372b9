use bk_core::error::{BkError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// A version-control backend able to record the state of the project.
pub trait Snapshotter {
    fn is_repo(&self) -> bool;
    /// Modified or untracked files present.
    fn is_dirty(&self) -> Result<bool>;
    fn snapshot(&self, message: &str) -> Result<()>;
}

/// Commit message: local time, RFC 3339 with offset.
pub fn snapshot_message() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Shells out to the `git` binary in the project directory.
#[derive(Debug, Clone)]
pub struct GitSnapshotter {
    repo: PathBuf,
    push: bool,
}

impl GitSnapshotter {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            push: true,
        }
    }

    pub fn with_push(mut self, push: bool) -> Self {
        self.push = push;
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        debug!(repo = %self.repo.display(), ?args, "git");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(args)
            .output()
            .map_err(|e| BkError::Snapshot(format!("git {} execution failed: {e}", args.join(" "))))?;
        if !output.status.success() {
            return Err(BkError::Snapshot(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Snapshotter for GitSnapshotter {
    fn is_repo(&self) -> bool {
        self.git(&["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false)
    }

    fn is_dirty(&self) -> Result<bool> {
        let status = self.git(&["status", "--porcelain", "--untracked-files=all"])?;
        Ok(!status.trim().is_empty())
    }

    fn snapshot(&self, message: &str) -> Result<()> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-a", "-m", message])?;
        if self.push {
            self.git(&["push"])?;
        }
        info!(repo = %self.repo.display(), message, push = self.push, "snapshot committed");
        Ok(())
    }
}
