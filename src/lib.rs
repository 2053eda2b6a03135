//! Turns generated code into pull requests.
//!
//! Model output is normalized into [`patch::FileChange`]s, each path is
//! sanitized and each body cleaned, and [`publisher::GitPublisher`] commits
//! the result to a task branch through the git data API before opening a
//! pull request against the default branch.

pub mod cli;
pub mod config;
pub mod error;
pub mod forge;
pub mod generate;
pub mod orchestrator;
pub mod patch;
pub mod publisher;
pub mod server;
pub mod task;

pub use error::{PatchpilotError, Result};
