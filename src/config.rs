use crate::store::DEFAULT_PREFIX;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(name = "zamesd")]
#[command(about = "ZAMES local data sidecar (JSON lines over stdin/stdout)")]
pub struct Config {
    /// Workspace directory to open at startup
    #[arg(short, long, env = "ZAMES_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Key prefix that namespaces every stored entry
    #[arg(long, env = "ZAMES_PREFIX", default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Logs go to stderr; stdout carries responses only. `ZAMES_LOG` overrides the level.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_env("ZAMES_LOG")
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
