// src/storage/git.rs

//! Publishing the data directory to a git remote.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::PublishConfig;

/// What a publish run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Pushed,
    NothingToCommit,
}

/// Commits and pushes the data directory.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish the current data, labelled with `date` (`YYYY-MM-DD`).
    async fn publish(&self, date: &str) -> Result<PublishOutcome>;
}

/// [`Publisher`] driving the `git` command line.
pub struct GitPublisher {
    config: PublishConfig,
    data_dir: PathBuf,
    token: String,
}

impl GitPublisher {
    pub fn new(config: PublishConfig, data_dir: impl Into<PathBuf>, token: impl Into<String>) -> Self {
        Self {
            config,
            data_dir: data_dir.into(),
            token: token.into(),
        }
    }

    /// Build from configuration, reading the token from the environment.
    pub fn from_env(config: &PublishConfig, data_dir: &Path) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| AppError::config(format!("{} is not set", config.token_env)))?;
        Ok(Self::new(config.clone(), data_dir, token))
    }

    fn push_url(&self) -> String {
        self.config.remote.replace("{token}", &self.token)
    }

    fn commit_message(date: &str) -> String {
        format!("[skip ci] sync: {date}")
    }

    /// Run `git` with `args`, failing on a non-zero exit.
    ///
    /// `label` is used in errors instead of the arguments, which may hold the token.
    async fn git(&self, label: &str, args: &[&str]) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .output()
            .await
            .map_err(|e| AppError::publish(format!("failed to run git {label}: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).replace(&self.token, "***");
            return Err(AppError::publish(format!("git {label} failed: {}", stderr.trim())));
        }
        Ok(output)
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, date: &str) -> Result<PublishOutcome> {
        let data_dir = self.data_dir.to_string_lossy();
        self.git("add", &["add", "--", &data_dir]).await?;

        let staged = Command::new("git")
            .args(["diff", "--cached", "--quiet"])
            .status()
            .await?;
        if staged.success() {
            log::info!("Nothing to publish");
            return Ok(PublishOutcome::NothingToCommit);
        }

        let name = format!("user.name={}", self.config.user_name);
        let email = format!("user.email={}", self.config.user_email);
        let message = Self::commit_message(date);
        self.git("commit", &["-c", &name, "-c", &email, "commit", "-m", &message])
            .await?;

        let push_url = self.push_url();
        let refspec = format!("HEAD:{}", self.config.branch);
        self.git("push", &["push", "-q", &push_url, &refspec]).await?;

        log::info!("Published data to {}", self.config.branch);
        Ok(PublishOutcome::Pushed)
    }
}
