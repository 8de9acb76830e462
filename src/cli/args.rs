use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tl-gateway")]
#[command(about = "Cached, rate-limited HTTP translation gateway")]
#[command(version)]
pub struct Args {
    /// Config file (default: ~/.config/tl-gateway/config.toml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(short = 'b', long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Cache URL (redis://, sqlite://<path> or memory://)
    #[arg(long)]
    pub cache_url: Option<String>,

    /// Disable cache
    #[arg(short = 'n', long)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Show the resolved configuration
    Config,
    /// List languages recognized by source detection
    Languages,
}
