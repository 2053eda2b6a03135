//! Interface to the git hosting provider.
//!
//! The publisher only needs the low-level git data operations (refs, blobs,
//! trees, commits) plus pull request creation, so that is all the [`Forge`]
//! trait exposes.
//!
//! [`Forge`]: traits::Forge

/// Configuration and authentication for the hosting connection.
pub mod config;

/// GitHub API client implementation for GitHub.com and Enterprise.
pub mod github;

/// Request and response types for git data operations.
pub mod request;

/// Common trait for forge platform abstraction.
pub mod traits;
