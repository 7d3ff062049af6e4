use std::process::ExitCode;

mod ai;
mod app;
mod config;
mod db;
mod error;
mod models;
mod services;
mod transcript;
mod youtube;

use ai::Generator;
use app::Pipeline;
use config::Config;
use db::Repository;
use error::{AppError, Result};
use transcript::TranscriptAcquirer;
use youtube::YouTubeLister;

#[tokio::main]
async fn main() -> ExitCode {
    // Operator log goes to stderr; RUST_LOG overrides the default level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mode = Mode::from_args(std::env::args().skip(1));

    let result = if mode == Mode::ListModels {
        print_models().await
    } else {
        run_once().await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_config() => {
            tracing::error!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Run,
    ListModels,
}

impl Mode {
    fn from_args(args: impl IntoIterator<Item = String>) -> Self {
        let mut mode = Mode::Run;
        for arg in args {
            match arg.as_str() {
                "--list-models" => mode = Mode::ListModels,
                other => tracing::warn!("Ignoring unknown argument {:?}", other),
            }
        }
        mode
    }
}

async fn run_once() -> Result<()> {
    // Fails before any external call when a required value is missing
    let config = Config::load()?;

    let lister = YouTubeLister::new(&config)?;
    let acquirer = TranscriptAcquirer::from_config(&config)?;
    let generator = Generator::new(&config)?;
    let repository = Repository::new(config.database_path()?).await?;

    tracing::info!(
        channel_id = %config.channel_id,
        strategies = ?acquirer.strategy_names(),
        "Checking channel for new videos"
    );

    let report = Pipeline::new(&config, &lister, &repository, &acquirer, &generator)
        .run()
        .await;

    let stored = repository.count_videos().await;
    repository.close().await?;

    if let Ok(stored) = stored {
        tracing::info!(stored, "Articles in store");
    }

    if report.persist_failed > 0 {
        tracing::warn!("{} article(s) could not be saved", report.persist_failed);
    }
    Ok(())
}

async fn print_models() -> Result<()> {
    let config = Config::read()?;
    if config.gemini_api_keys.is_empty() {
        return Err(AppError::Config("GEMINI_API_KEY is not set".to_string()));
    }

    let generator = Generator::new(&config)?;
    let models = generator.list_models().await?;

    if models.is_empty() {
        println!("No text generation models available for this key.");
    }
    for model in models {
        println!("{}\t{}", model.name, model.display_name);
    }
    Ok(())
}
