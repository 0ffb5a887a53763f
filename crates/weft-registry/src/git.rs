//! Fetch sources by shelling out to the `git` binary.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use weft_util::errors::{WeftError, WeftResult};
use weft_util::process::CommandBuilder;

use crate::traits::GitFetcher;

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Shallow-fetches a single commit with the system `git`.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    attempts: u32,
    retry_delay: Duration,
}

impl GitCli {
    pub fn new(attempts: u32) -> Self {
        Self {
            program: "git".to_string(),
            attempts: attempts.max(1),
            retry_delay: RETRY_DELAY,
        }
    }

    fn git(&self, dir: &Path) -> CommandBuilder {
        CommandBuilder::new(&self.program)
            .cwd(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
    }

    fn checkout(&self, repo_url: &str, commit_hash: &str, dest: &Path) -> WeftResult<()> {
        std::fs::create_dir_all(dest)?;
        self.git(dest).args(["init", "--quiet"]).exec_checked(repo_url)?;
        self.git(dest)
            .args(["remote", "add", "origin", repo_url])
            .exec_checked(repo_url)?;
        self.git(dest)
            .args(["fetch", "--quiet", "--depth", "1", "origin", commit_hash])
            .exec_checked(repo_url)?;
        self.git(dest)
            .args(["checkout", "--quiet", "--detach", "FETCH_HEAD"])
            .exec_checked(repo_url)?;

        let head = self.git(dest).args(["rev-parse", "HEAD"]).exec_checked(repo_url)?;
        let head = String::from_utf8_lossy(&head.stdout).trim().to_string();
        if !head.starts_with(commit_hash) && !commit_hash.starts_with(&head) {
            return Err(WeftError::Registry {
                message: format!("{repo_url}: expected commit {commit_hash}, got {head}"),
            });
        }
        Ok(())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl GitFetcher for GitCli {
    async fn fetch_into(&self, repo_url: &str, commit_hash: &str, dest: &Path) -> WeftResult<()> {
        let mut last_err = None;

        for attempt in 0..self.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay * attempt).await;
                if dest.exists() {
                    std::fs::remove_dir_all(dest)?;
                }
            }

            let this = self.clone();
            let (url, commit, target) = (
                repo_url.to_string(),
                commit_hash.to_string(),
                dest.to_path_buf(),
            );
            let result = tokio::task::spawn_blocking(move || this.checkout(&url, &commit, &target))
                .await
                .map_err(|e| WeftError::FetchFailure {
                    resource: repo_url.to_string(),
                    message: format!("git worker stopped: {e}"),
                })?;

            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() => {
                    tracing::warn!("git fetch of {repo_url}@{commit_hash} failed: {e}");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| WeftError::FetchFailure {
            resource: repo_url.to_string(),
            message: "no attempts made".to_string(),
        }))
    }
}
