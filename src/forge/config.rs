//! Configuration for the git hosting connection.
use secrecy::SecretString;

/// Branch name prefix for task branches.
pub const DEFAULT_BRANCH_PREFIX: &str = "ai-task";
/// File mode for regular, non-executable files in a git tree.
pub const TREE_BLOB_MODE: &str = "100644";
/// Tree entry type for file contents.
pub const TREE_BLOB_TYPE: &str = "blob";
/// Encoding used when uploading blob contents.
pub const BLOB_ENCODING: &str = "utf-8";

/// Remote repository connection configuration for authenticating and
/// interacting with the hosting API.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Remote forge host (e.g., "github.com").
    pub host: String,
    /// URL scheme (http or https).
    pub scheme: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Access token for authentication.
    pub token: SecretString,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            scheme: "https".to_string(),
            owner: "".to_string(),
            repo: "".to_string(),
            token: SecretString::from("".to_string()),
        }
    }
}

impl RemoteConfig {
    /// Full `owner/repo` path.
    pub fn path(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Base URI of the REST API for this host.
    pub fn api_base_uri(&self) -> String {
        format!("{}://api.{}", self.scheme, self.host)
    }

    /// Whether an owner and repository name are both set.
    pub fn is_configured(&self) -> bool {
        !self.owner.is_empty() && !self.repo.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_remote_config() {
        let remote = RemoteConfig::default();
        assert!(!remote.is_configured());
        assert_eq!(remote.api_base_uri(), "https://api.github.com");
    }

    #[test]
    fn test_path() {
        let remote = RemoteConfig {
            owner: "acme".into(),
            repo: "widgets".into(),
            ..RemoteConfig::default()
        };
        assert!(remote.is_configured());
        assert_eq!(remote.path(), "acme/widgets");
    }
}
