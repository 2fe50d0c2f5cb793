//! autoop - Main Entry Point

use clap::Parser;
use autoop::artifact::AutoMLSystem;
use autoop::cli::{cmd_artifacts, cmd_datasets, cmd_detect, cmd_models, cmd_predict, cmd_train, Cli, Commands};
use autoop::config::SystemConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = SystemConfig::load(cli.config.as_deref())?;
    if let Some(assets) = &cli.assets {
        config = config.with_assets_root(assets);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .init();

    let system = AutoMLSystem::open(config)?;

    match &cli.command {
        Commands::Datasets { action } => cmd_datasets(&system, action)?,
        Commands::Detect { data } => cmd_detect(data)?,
        Commands::Train { data, target, inputs, model, metrics, split, params, save } => {
            cmd_train(
                &system,
                data,
                target,
                inputs,
                model,
                metrics,
                *split,
                params,
                save.as_deref(),
            )?;
        }
        Commands::Artifacts { action } => cmd_artifacts(&system, action)?,
        Commands::Predict { pipeline, data } => cmd_predict(&system, pipeline, data)?,
        Commands::Models => cmd_models(&system)?,
    }

    Ok(())
}
