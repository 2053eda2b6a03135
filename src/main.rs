use clap::Parser;
use log::*;
use serde::de::DeserializeOwned;
use std::{path::Path, sync::Arc};

use patchpilot::{
    Result,
    cli::{self, Args, Command},
    config::Config,
    forge::{github::Github, traits::Forge},
    generate::{ChatCompletions, Generator},
    orchestrator::Orchestrator,
    patch::normalize::unwrap_double_wrapped,
    publisher::{GitPublisher, PublishRequest},
    server::{self, AppState, ServerConfig},
    task::{InMemoryTaskStore, Task},
};

fn initialize_logger(debug: bool) -> Result<()> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("patchpilot")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

fn generators(
    config: &Config,
) -> Result<(Arc<dyn Generator>, Arc<dyn Generator>)> {
    let key = cli::generator_key();

    if key.is_none() {
        warn!(
            "{} is not set: generation requests may be rejected",
            cli::GENERATOR_KEY_VAR
        );
    }

    let planner = ChatCompletions::planner(&config.generator, key.clone())?;
    let coder = ChatCompletions::coder(&config.generator, key)?;

    Ok((Arc::new(planner), Arc::new(coder)))
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli_args = Args::parse();

    initialize_logger(cli_args.debug)?;

    let config = Config::load(cli_args.config.as_deref()).await?;
    let remote = cli_args.get_remote()?;

    info!("publishing to github repo: {}", remote.path());

    let forge: Arc<dyn Forge> = Arc::new(Github::new(remote)?);
    let publisher = Arc::new(
        GitPublisher::new(forge)
            .with_protected_paths(config.protected_paths.clone()),
    );

    match cli_args.command {
        Command::Publish { request } => {
            let mut req: PublishRequest = read_json(&request).await?;
            req.files = unwrap_double_wrapped(req.files);

            let result = publisher
                .publish_with_timeout(req, config.publish_timeout())
                .await?;

            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Run { task } => {
            let task: Task = read_json(&task).await?;
            let (planner, coder) = generators(&config)?;

            let orchestrator = Orchestrator::new(
                planner,
                coder,
                publisher,
                config.publish_timeout(),
            );

            let report = orchestrator.run(&task).await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Serve { port } => {
            let (planner, coder) = generators(&config)?;

            let state = Arc::new(AppState::new(
                publisher,
                planner,
                coder,
                Arc::new(InMemoryTaskStore::default()),
                config.publish_timeout(),
            ));

            let server_config = ServerConfig {
                port: port.unwrap_or(config.port),
                cors: config.cors,
            };

            server::start_server(server_config, state).await?;
        }
    }

    Ok(())
}
