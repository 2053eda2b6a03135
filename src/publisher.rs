//! Publishes file changes as a single commit, branch and pull request.
//!
//! Files are committed through the git data API instead of per-file content
//! writes: every file becomes a blob, the blobs are layered over the default
//! branch's tree, and one commit points at the result. Any number of files
//! therefore lands atomically.
//!
//! The target branch is treated as disposable staging for generated output.
//! Each publish resets it to the current default branch head before the new
//! commit is built, discarding whatever the branch held before.

use futures_util::future::try_join_all;
use log::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{
    Result,
    error::PatchpilotError,
    forge::{
        request::{CreateCommitRequest, CreatePrRequest, CreateTreeRequest, TreeEntry},
        traits::Forge,
    },
    patch::{FileChange, clean::clean, sanitize::sanitize},
};

/// Heading that introduces the plan in pull request bodies.
pub const PLAN_HEADING: &str = "### AI Plan";
/// Pull request body text used when no plan was supplied.
pub const NO_PLAN_PLACEHOLDER: &str = "_(no plan provided)_";

/// Everything needed to publish one set of file changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub branch_name: String,
    pub commit_message: String,
    pub files: Vec<FileChange>,
    #[serde(default)]
    pub plan: Option<String>,
}

/// Identifiers of the pull request and commit created by a publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub pr_url: String,
    pub pr_number: u64,
    pub branch_name: String,
    pub commit_sha: String,
}

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Per-branch async locks.
///
/// Force-updating a branch is last-write-wins, so two publishes to the same
/// branch name are only well defined when they run one after the other.
/// A branch's entry lives only while some publish holds or awaits it.
#[derive(Debug, Clone, Default)]
pub struct BranchLocks {
    locks: LockMap,
}

impl BranchLocks {
    /// Wait until no other publish holds `branch`.
    pub async fn lock(&self, branch: &str) -> BranchGuard {
        let lock = {
            let mut locks =
                self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries left behind by cancelled waiters.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(branch.to_string()).or_default())
        };

        BranchGuard {
            guard: Some(lock.lock_owned().await),
            branch: branch.to_string(),
            locks: Arc::clone(&self.locks),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held for the duration of a publish. Dropping it releases the branch and
/// forgets the branch's lock once nobody else is waiting on it.
#[derive(Debug)]
pub struct BranchGuard {
    guard: Option<OwnedMutexGuard<()>>,
    branch: String,
    locks: LockMap,
}

impl Drop for BranchGuard {
    fn drop(&mut self) {
        // Release first so our own reference no longer counts.
        drop(self.guard.take());

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.branch)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.branch);
        }
    }
}

/// Request that passed validation: paths are sanitized and nothing is
/// missing.
#[derive(Debug)]
struct ValidatedRequest {
    branch_name: String,
    commit_message: String,
    files: Vec<FileChange>,
    plan: Option<String>,
}

/// Turns [`PublishRequest`]s into pull requests on the configured forge.
pub struct GitPublisher {
    forge: Arc<dyn Forge>,
    locks: BranchLocks,
    protected_paths: Vec<String>,
}

impl GitPublisher {
    pub fn new(forge: Arc<dyn Forge>) -> Self {
        Self {
            forge,
            locks: BranchLocks::default(),
            protected_paths: vec![],
        }
    }

    /// Refuse to write any path starting with one of `prefixes`.
    pub fn with_protected_paths(mut self, prefixes: Vec<String>) -> Self {
        self.protected_paths = prefixes
            .into_iter()
            .map(|p| p.trim_start_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    /// Publish with a deadline. When it expires the in-flight step is
    /// dropped and no later step runs.
    pub async fn publish_with_timeout(
        &self,
        req: PublishRequest,
        timeout: Duration,
    ) -> Result<PublishResult> {
        match tokio::time::timeout(timeout, self.publish(req)).await {
            Ok(result) => result,
            Err(_) => {
                error!("publish aborted after {}s", timeout.as_secs());
                Err(PatchpilotError::Timeout(timeout.as_secs()))
            }
        }
    }

    /// Validate `req`, then commit its files on a fresh branch and open a
    /// pull request against the default branch.
    ///
    /// Steps are not retried and nothing is rolled back on failure: blobs,
    /// trees and commits are inert until a ref points at them.
    pub async fn publish(&self, req: PublishRequest) -> Result<PublishResult> {
        let req = self.validate(req)?;

        let _guard = self.locks.lock(&req.branch_name).await;

        let default_branch = self.forge.default_branch().await?;
        info!("resolved default branch: {default_branch}");

        let base_sha = self.forge.get_branch_sha(&default_branch).await?;
        let base_commit = self.forge.get_commit(&base_sha).await?;
        info!(
            "{default_branch} is at {base_sha} (tree {})",
            base_commit.tree_sha
        );

        self.reset_branch(&req.branch_name, &base_sha).await?;

        let entries = self.create_blobs(&req.files).await?;

        let tree = self
            .forge
            .create_tree(CreateTreeRequest {
                base_tree: base_commit.tree_sha,
                tree: entries,
            })
            .await?;

        let commit = self
            .forge
            .create_commit(CreateCommitRequest {
                message: req.commit_message.clone(),
                tree: tree.sha,
                parents: vec![base_sha],
            })
            .await?;

        self.forge
            .update_branch_ref(&req.branch_name, &commit.sha, true)
            .await?;

        info!(
            "opening pull request {} -> {default_branch}",
            req.branch_name
        );

        let pr = self
            .forge
            .create_pr(CreatePrRequest {
                head_branch: req.branch_name.clone(),
                base_branch: default_branch,
                title: req.commit_message,
                body: pr_body(req.plan.as_deref()),
            })
            .await?;

        info!("opened pull request #{}: {}", pr.number, pr.html_url);

        Ok(PublishResult {
            pr_url: pr.html_url,
            pr_number: pr.number,
            branch_name: req.branch_name,
            commit_sha: commit.sha,
        })
    }

    fn validate(&self, req: PublishRequest) -> Result<ValidatedRequest> {
        if req.branch_name.trim().is_empty() {
            return Err(PatchpilotError::validation("branchName is required"));
        }

        if req.commit_message.trim().is_empty() {
            return Err(PatchpilotError::validation(
                "commitMessage is required",
            ));
        }

        if req.files.is_empty() {
            return Err(PatchpilotError::validation(
                "files[] is required and must be non-empty",
            ));
        }

        let mut files = Vec::with_capacity(req.files.len());

        for file in req.files {
            let path = sanitize(&file.path)?;

            if let Some(prefix) =
                self.protected_paths.iter().find(|p| path.starts_with(*p))
            {
                return Err(PatchpilotError::validation(format!(
                    "path {path} is protected by rule: {prefix}"
                )));
            }

            files.push(FileChange {
                path,
                content: file.content,
            });
        }

        Ok(ValidatedRequest {
            branch_name: req.branch_name,
            commit_message: req.commit_message,
            files,
            plan: req.plan,
        })
    }

    /// Point `branch` at `base_sha`, creating it when it does not exist.
    async fn reset_branch(&self, branch: &str, base_sha: &str) -> Result<()> {
        match self.forge.get_branch_sha(branch).await {
            Ok(existing) => {
                info!(
                    "branch {branch} already exists at {existing}: resetting to {base_sha}"
                );
                self.forge.update_branch_ref(branch, base_sha, true).await
            }
            Err(PatchpilotError::NotFound(_)) => {
                info!("branch {branch} does not exist: creating");
                self.forge.create_branch_ref(branch, base_sha).await
            }
            Err(err) => {
                error!("failed to look up branch {branch}: {err}");
                Err(err)
            }
        }
    }

    /// Upload every file concurrently and collect the tree entries.
    async fn create_blobs(&self, files: &[FileChange]) -> Result<Vec<TreeEntry>> {
        let uploads = files.iter().map(|file| async move {
            let content = clean(file.content.as_str());
            debug!("creating blob for: {}", file.path);
            let blob = self.forge.create_blob(&content).await?;
            Ok::<TreeEntry, PatchpilotError>(TreeEntry::blob(
                file.path.clone(),
                blob.sha,
            ))
        });

        try_join_all(uploads).await
    }
}

fn pr_body(plan: Option<&str>) -> String {
    let plan = plan
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(NO_PLAN_PLACEHOLDER);

    format!("{PLAN_HEADING}\n\n{plan}")
}
