//! Implements the Forge trait for Github
use async_trait::async_trait;
use log::*;
use octocrab::{
    Octocrab,
    models::repos::Object,
    params::repos::Reference,
};
use serde::Deserialize;
use url::Url;

use crate::{
    Result,
    error::PatchpilotError,
    forge::{
        config::{BLOB_ENCODING, RemoteConfig},
        request::{
            Blob, Commit, CommitInfo, CreateCommitRequest, CreatePrRequest,
            CreateTreeRequest, PullRequest, Tree,
        },
        traits::Forge,
    },
};

#[derive(Debug, Deserialize)]
struct GitCommitTree {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
struct GitCommit {
    pub sha: String,
    pub tree: GitCommitTree,
}

/// GitHub forge implementation using Octocrab for the git data API and
/// pull requests.
pub struct Github {
    config: RemoteConfig,
    base_uri: String,
    instance: Octocrab,
}

impl Github {
    /// Create GitHub client with personal access token authentication and API
    /// base URL configuration. No request is made until the first call.
    pub fn new(config: RemoteConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(PatchpilotError::invalid_config(
                "github repository must be in owner/repo form",
            ));
        }

        let base_uri = config.api_base_uri();
        let instance = Octocrab::builder()
            .personal_token(config.token.clone())
            .base_uri(base_uri.clone())?
            .build()?;

        Ok(Self {
            config,
            base_uri,
            instance,
        })
    }

    fn git_endpoint(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/git/{}",
            self.base_uri, self.config.owner, self.config.repo, path
        )
    }

    /// Endpoint for `refs/heads/<branch>` with each branch segment
    /// percent-encoded.
    fn ref_endpoint(&self, branch: &str) -> Result<String> {
        let mut url = Url::parse(&self.git_endpoint("refs/heads"))
            .map_err(|e| PatchpilotError::invalid_config(e.to_string()))?;

        url.path_segments_mut()
            .map_err(|_| {
                PatchpilotError::invalid_config(format!(
                    "github api base cannot hold a path: {}",
                    self.base_uri
                ))
            })?
            .extend(branch.split('/'));

        Ok(url.to_string())
    }
}

/// A missing ref answers 404. Only ref lookups treat that as absence.
fn absent_on_404(err: PatchpilotError, branch: &str) -> PatchpilotError {
    match err {
        PatchpilotError::Provider { status: 404, .. } => {
            PatchpilotError::NotFound(format!("branch {branch}"))
        }
        other => other,
    }
}

fn pull_request(number: u64, html_url: Option<Url>) -> Result<PullRequest> {
    let html_url = html_url.ok_or_else(|| {
        PatchpilotError::provider(
            201,
            format!("pull request #{number} created without an html_url"),
        )
    })?;

    Ok(PullRequest {
        number,
        html_url: html_url.to_string(),
    })
}

#[async_trait]
impl Forge for Github {
    async fn default_branch(&self) -> Result<String> {
        let repo = self
            .instance
            .repos(&self.config.owner, &self.config.repo)
            .get()
            .await?;

        repo.default_branch.ok_or_else(|| {
            PatchpilotError::NotFound(format!(
                "failed to find default branch for github repo: {}",
                self.config.path()
            ))
        })
    }

    async fn get_branch_sha(&self, branch: &str) -> Result<String> {
        let branch_ref = self
            .instance
            .repos(&self.config.owner, &self.config.repo)
            .get_ref(&Reference::Branch(branch.to_string()))
            .await
            .map_err(|e| absent_on_404(e.into(), branch))?;

        match branch_ref.object {
            Object::Commit { sha, .. } => Ok(sha),
            _ => Err(PatchpilotError::provider(
                422,
                format!("ref heads/{branch} does not point at a commit"),
            )),
        }
    }

    async fn create_branch_ref(&self, branch: &str, sha: &str) -> Result<()> {
        info!("creating branch {branch} at {sha}");

        self.instance
            .repos(&self.config.owner, &self.config.repo)
            .create_ref(&Reference::Branch(branch.to_string()), sha)
            .await?;

        Ok(())
    }

    async fn update_branch_ref(
        &self,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> Result<()> {
        info!("updating branch {branch} to {sha} (force: {force})");

        let endpoint = self.ref_endpoint(branch)?;

        let _: serde_json::Value = self
            .instance
            .patch(
                endpoint,
                Some(&serde_json::json!({
                  "sha": sha,
                  "force": force
                })),
            )
            .await?;

        Ok(())
    }

    async fn get_commit(&self, sha: &str) -> Result<CommitInfo> {
        let endpoint = self.git_endpoint(&format!("commits/{sha}"));

        let commit: GitCommit = self.instance.get(endpoint, None::<&()>).await?;

        Ok(CommitInfo {
            sha: commit.sha,
            tree_sha: commit.tree.sha,
        })
    }

    async fn create_blob(&self, content: &str) -> Result<Blob> {
        let body = serde_json::json!({
          "content": content,
          "encoding": BLOB_ENCODING,
        });

        let blob: Blob = self
            .instance
            .post(self.git_endpoint("blobs"), Some(&body))
            .await?;

        debug!("created blob {} ({} bytes)", blob.sha, content.len());

        Ok(blob)
    }

    async fn create_tree(&self, req: CreateTreeRequest) -> Result<Tree> {
        info!(
            "creating tree with {} entries starting from: {}",
            req.tree.len(),
            req.base_tree
        );

        let body = serde_json::json!(req);

        let tree: Tree = self
            .instance
            .post(self.git_endpoint("trees"), Some(&body))
            .await?;

        info!("created new tree: {}", tree.sha);

        Ok(tree)
    }

    async fn create_commit(&self, req: CreateCommitRequest) -> Result<Commit> {
        let body = serde_json::json!(req);

        let commit: Commit = self
            .instance
            .post(self.git_endpoint("commits"), Some(&body))
            .await?;

        info!("created commit: {}", commit.sha);

        Ok(commit)
    }

    async fn create_pr(&self, req: CreatePrRequest) -> Result<PullRequest> {
        let pr = self
            .instance
            .pulls(&self.config.owner, &self.config.repo)
            .create(req.title, req.head_branch, req.base_branch)
            .body(req.body)
            .send()
            .await?;

        pull_request(pr.number, pr.html_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn remote_config() -> RemoteConfig {
        RemoteConfig {
            host: "github.com".into(),
            scheme: "https".into(),
            owner: "acme".into(),
            repo: "widgets".into(),
            token: SecretString::from("test-token".to_string()),
        }
    }

    #[tokio::test]
    async fn builds_git_endpoints_from_config() {
        let github = Github::new(remote_config()).unwrap();

        assert_eq!(
            github.git_endpoint("refs/heads/ai-task-7"),
            "https://api.github.com/repos/acme/widgets/git/refs/heads/ai-task-7"
        );
    }

    #[tokio::test]
    async fn encodes_branch_segments_in_ref_endpoint() {
        let github = Github::new(remote_config()).unwrap();

        assert_eq!(
            github.ref_endpoint("ai/task#7?x%").unwrap(),
            "https://api.github.com/repos/acme/widgets/git/refs/heads/ai/task%237%3Fx%25"
        );
        assert_eq!(
            github.ref_endpoint("ai-task-7").unwrap(),
            "https://api.github.com/repos/acme/widgets/git/refs/heads/ai-task-7"
        );
    }

    #[test]
    fn only_missing_refs_become_not_found() {
        let err = absent_on_404(PatchpilotError::provider(404, "Not Found"), "b");
        assert!(matches!(err, PatchpilotError::NotFound(_)));

        let err = absent_on_404(PatchpilotError::provider(403, "Forbidden"), "b");
        assert!(matches!(err, PatchpilotError::Provider { status: 403, .. }));
    }

    #[test]
    fn pull_request_requires_html_url() {
        let url = Url::parse("https://github.com/acme/widgets/pull/3").unwrap();
        let pr = pull_request(3, Some(url)).unwrap();
        assert_eq!(pr.number, 3);
        assert_eq!(pr.html_url, "https://github.com/acme/widgets/pull/3");

        let err = pull_request(4, None).unwrap_err();
        assert!(matches!(err, PatchpilotError::Provider { .. }));
        assert!(err.details().contains("#4"));
    }

    #[tokio::test]
    async fn rejects_unconfigured_repository() {
        let result = Github::new(RemoteConfig::default());

        assert!(matches!(result, Err(PatchpilotError::InvalidConfig(_))));
    }
}
