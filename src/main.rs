use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tl_gateway::cli::commands::config::print_config;
use tl_gateway::cli::{Args, Command};
use tl_gateway::config::{ConfigManager, ResolveOptions, process_env, resolve_config};
use tl_gateway::server;
use tl_gateway::translation::print_languages;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Serve);

    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(path) => info!("Loaded environment variables from {}", path.display()),
        Err(_) => debug!("No .env file found, using system environment variables"),
    }

    let manager = args
        .config
        .clone()
        .map_or_else(ConfigManager::new, ConfigManager::with_path);

    let options = ResolveOptions {
        bind: args.bind,
        port: args.port,
        cache_url: args.cache_url,
        no_cache: args.no_cache,
    };

    let config = match manager
        .load_or_default()
        .and_then(|file| resolve_config(&options, &file, process_env))
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    match command {
        Command::Serve => server::serve(&config).await?,
        Command::Config => print_config(manager.config_path(), &config),
        Command::Languages => print_languages(),
    }

    Ok(())
}
