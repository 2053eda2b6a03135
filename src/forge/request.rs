use serde::{Deserialize, Serialize};

use crate::forge::config::{TREE_BLOB_MODE, TREE_BLOB_TYPE};

#[derive(Debug, Clone, PartialEq, Serialize)]
/// A path override within a new tree, pointing at an uploaded blob.
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    /// Regular, non-executable file entry.
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: TREE_BLOB_MODE.into(),
            kind: TREE_BLOB_TYPE.into(),
            sha: sha.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
/// Request to create a tree layered on top of an existing one.
pub struct CreateTreeRequest {
    pub base_tree: String,
    pub tree: Vec<TreeEntry>,
}

#[derive(Debug, Clone, Serialize)]
/// Request to create a commit object.
pub struct CreateCommitRequest {
    pub message: String,
    pub tree: String,
    pub parents: Vec<String>,
}

#[derive(Debug, Clone)]
/// Request to create a new pull request.
pub struct CreatePrRequest {
    pub head_branch: String,
    pub base_branch: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Blob {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
}

#[derive(Debug, Clone)]
/// An existing commit and the tree it points at.
pub struct CommitInfo {
    pub sha: String,
    pub tree_sha: String,
}

#[derive(Debug, Clone)]
/// Pull request opened by the publisher.
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_entry_serializes_git_field_names() {
        let entry = TreeEntry::blob("src/a.ts", "abc");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "path": "src/a.ts",
                "mode": "100644",
                "type": "blob",
                "sha": "abc"
            })
        );
    }
}
