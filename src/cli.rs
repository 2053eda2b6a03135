//! CLI argument parsing and GitHub remote configuration.
use clap::{Parser, Subcommand};
use git_url_parse::GitUrl;
use secrecy::SecretString;
use std::{env, path::PathBuf};

use crate::{Result, error::PatchpilotError, forge::config::RemoteConfig};

/// Environment variable holding the model API key.
pub const GENERATOR_KEY_VAR: &str = "OPENAI_API_KEY";

/// Global CLI arguments for the hosting connection and debugging.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value = "", global = true)]
    /// GitHub repository as owner/repo or URL (https://github.com/owner/repo).
    pub github_repo: String,

    #[arg(long, default_value = "", global = true)]
    /// GitHub personal access token. Falls back to GITHUB_TOKEN env var.
    pub github_token: String,

    #[arg(long, global = true)]
    /// Path to the configuration file. Defaults to ./patchpilot.toml.
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = false, global = true)]
    /// Enable debug logging.
    pub debug: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long)]
        /// Port to listen on. Overrides the config file.
        port: Option<u16>,
    },

    /// Publish a JSON publish request file as a pull request.
    Publish {
        /// File with {branchName, commitMessage, files, plan}.
        request: PathBuf,
    },

    /// Plan, generate and publish a JSON task file.
    Run {
        /// File with {id, title, description, ...}.
        task: PathBuf,
    },
}

impl Args {
    /// Configure the GitHub connection from CLI arguments.
    pub fn get_remote(&self) -> Result<RemoteConfig> {
        if self.github_repo.is_empty() {
            return Err(PatchpilotError::invalid_config(
                "must configure a github repository",
            ));
        }

        get_github_remote(&self.github_repo, &self.github_token)
    }
}

/// Model API key from the environment, when set.
pub fn generator_key() -> Option<SecretString> {
    env::var(GENERATOR_KEY_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

/// Validate repository URL uses HTTP or HTTPS scheme.
fn validate_scheme(scheme: git_url_parse::Scheme) -> Result<()> {
    match scheme {
        git_url_parse::Scheme::Http => Ok(()),
        git_url_parse::Scheme::Https => Ok(()),
        _ => Err(PatchpilotError::invalid_config(
            "only http and https schemes are supported for repo urls",
        )),
    }
}

/// Configure GitHub remote with URL parsing and token resolution.
fn get_github_remote(
    github_repo: &str,
    github_token: &str,
) -> Result<RemoteConfig> {
    let (mut remote, url_token) = match github_repo.split_once('/') {
        Some((owner, repo))
            if !github_repo.contains(':')
                && !owner.is_empty()
                && !repo.is_empty()
                && !repo.contains('/') =>
        {
            let remote = RemoteConfig {
                owner: owner.to_string(),
                repo: repo.trim_end_matches(".git").to_string(),
                ..RemoteConfig::default()
            };
            (remote, None)
        }
        _ => parse_repo_url(github_repo)?,
    };

    let mut token = github_token.to_string();

    if token.is_empty()
        && let Some(url_token) = url_token
    {
        token = url_token;
    }

    if token.is_empty()
        && let Ok(env_var_token) = env::var("GITHUB_TOKEN")
    {
        token = env_var_token;
    }

    if token.is_empty() {
        return Err(PatchpilotError::invalid_config("must set github token"));
    }

    remote.token = SecretString::from(token);

    Ok(remote)
}

/// Parse a repository URL into a remote and any token embedded in it.
fn parse_repo_url(github_repo: &str) -> Result<(RemoteConfig, Option<String>)> {
    let parsed = GitUrl::parse(github_repo)?;

    validate_scheme(parsed.scheme)?;

    let host = parsed.host.ok_or_else(|| {
        PatchpilotError::invalid_config("unable to parse host from github repo")
    })?;

    let owner = parsed.owner.ok_or_else(|| {
        PatchpilotError::invalid_config(
            "unable to parse owner from github repo",
        )
    })?;

    let remote = RemoteConfig {
        host,
        scheme: parsed.scheme.to_string(),
        owner,
        repo: parsed.name,
        ..RemoteConfig::default()
    };

    Ok((remote, parsed.token))
}

#[cfg(test)]
mod tests {
    //! Unit tests for CLI argument parsing and remote configuration.
    use super::*;
    use secrecy::ExposeSecret;

    fn args(repo: &str, token: &str) -> Args {
        Args {
            github_repo: repo.into(),
            github_token: token.into(),
            config: None,
            debug: false,
            command: Command::Serve { port: None },
        }
    }

    #[test]
    fn gets_github_remote_from_url() {
        let remote = args("https://github.com/github_owner/github_repo", "tok")
            .get_remote()
            .unwrap();

        assert_eq!(remote.host, "github.com");
        assert_eq!(remote.scheme, "https");
        assert_eq!(remote.owner, "github_owner");
        assert_eq!(remote.repo, "github_repo");
        assert_eq!(remote.token.expose_secret(), "tok");
    }

    #[test]
    fn gets_github_remote_from_owner_repo() {
        let remote = args("acme/widgets", "tok").get_remote().unwrap();

        assert_eq!(remote.api_base_uri(), "https://api.github.com");
        assert_eq!(remote.path(), "acme/widgets");
    }

    #[test]
    fn gets_enterprise_host() {
        let remote = args("https://git.example.com/acme/widgets", "tok")
            .get_remote()
            .unwrap();

        assert_eq!(remote.api_base_uri(), "https://api.git.example.com");
    }

    #[test]
    fn requires_a_repository() {
        let result = args("", "tok").get_remote();

        assert!(matches!(result, Err(PatchpilotError::InvalidConfig(_))));
    }

    /// Test that only HTTP and HTTPS schemes are supported for repository URLs.
    #[test]
    fn only_supports_http_and_https_schemes() {
        let result = args("git@github.com:acme/widgets", "tok").get_remote();

        assert!(result.is_err());
    }

    #[test]
    fn parses_serve_subcommand() {
        let args = Args::parse_from([
            "patchpilot",
            "--github-repo",
            "acme/widgets",
            "serve",
            "--port",
            "8080",
        ]);

        assert!(matches!(args.command, Command::Serve { port: Some(8080) }));
        assert_eq!(args.github_repo, "acme/widgets");
    }

    #[test]
    fn parses_run_subcommand_with_global_flags_after() {
        let args =
            Args::parse_from(["patchpilot", "run", "task.json", "--debug"]);

        assert!(args.debug);
        assert!(
            matches!(args.command, Command::Run { task } if task == PathBuf::from("task.json"))
        );
    }
}
