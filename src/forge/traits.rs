//! Traits related to remote git forges
use async_trait::async_trait;

use crate::{
    Result,
    forge::request::{
        Blob, Commit, CommitInfo, CreateCommitRequest, CreatePrRequest,
        CreateTreeRequest, PullRequest, Tree,
    },
};

/// Low-level git data operations exposed by a hosting provider.
///
/// Every call may fail with a provider status. `get_branch_sha` reports a
/// missing branch as [`crate::PatchpilotError::NotFound`]; that is the only
/// absence signal callers are expected to recover from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Forge: Send + Sync {
    /// Name of the repository's default branch.
    async fn default_branch(&self) -> Result<String>;
    /// Commit SHA a branch currently points at.
    async fn get_branch_sha(&self, branch: &str) -> Result<String>;
    async fn create_branch_ref(&self, branch: &str, sha: &str) -> Result<()>;
    async fn update_branch_ref(
        &self,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> Result<()>;
    async fn get_commit(&self, sha: &str) -> Result<CommitInfo>;
    /// Upload utf-8 file contents as a blob.
    async fn create_blob(&self, content: &str) -> Result<Blob>;
    async fn create_tree(&self, req: CreateTreeRequest) -> Result<Tree>;
    async fn create_commit(&self, req: CreateCommitRequest) -> Result<Commit>;
    async fn create_pr(&self, req: CreatePrRequest) -> Result<PullRequest>;
}
