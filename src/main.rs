use anyhow::Context;
use clap::{Parser, Subcommand};
use geoportal::api::HttpBackend;
use geoportal::config::AppConfig;
use geoportal::data::load_store;
use geoportal::server::{start_server, AppState};
use geoportal::style::StyleBook;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the portal and map API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Load every layer and check it against the style rules, then exit
    Validate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        AppConfig::load_from_file(path)
    } else {
        info!("No config at {:?}, using defaults", path);
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Validate { config } => {
            let app_config = load_config(config)?;
            let store = load_store(&app_config.data)?;
            StyleBook::builtin()
                .validate(&store)
                .context("Layer data does not match the style rules")?;
            info!(
                "{} layers and {} points are valid",
                store.loaded_layers().count(),
                store.points().len()
            );
        }
        Commands::Serve { config } => {
            let app_config = load_config(config)?;
            info!("Serving portal with config: {:?}", config);

            let store = load_store(&app_config.data)?;
            StyleBook::builtin()
                .validate(&store)
                .context("Layer data does not match the style rules")?;

            let backend = HttpBackend::new(&app_config.api).context("Failed to create API client")?;
            info!("Using contributions API at {}", app_config.api.base_url);

            let state = Arc::new(AppState::new(app_config, store, Arc::new(backend)));
            start_server(state).await?;
        }
    }

    Ok(())
}
