//! depgraph CLI entry point

use clap::{Parser, Subcommand};
use depgraph_core::DepgraphConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "depgraph")]
#[command(about = "Explore the transitive dependency graph of npm packages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./depgraph.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Keep cached dependency lists in memory only
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dependency graph of a published package
    Graph {
        /// Package name, e.g. `cookies` or `@babel/core`
        name: String,

        /// Write the graph JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build the dependency graph of a local package.json
    Manifest {
        path: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Start the HTTP/WebSocket server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Open the health endpoint in a browser once listening. There is
        /// no UI; this only shows that the server is up
        #[arg(short, long)]
        open: bool,
    },
    /// Inspect or clear the dependency cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print entry count, size and counters
    Stats,
    /// Remove every cached entry
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("depgraph={}", log_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Commands::Version = cli.command {
        println!("depgraph v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = DepgraphConfig::load(cli.config.as_deref())?;
    tracing::debug!("Registry: {}", config.registry.url);

    let cache = commands::open_cache(&config.cache, cli.no_cache)?;

    match cli.command {
        Commands::Graph { name, output } => {
            let engine = commands::build_engine(&config, cache)?;
            commands::graph(&engine, &name, output.as_deref()).await
        }
        Commands::Manifest { path, output } => {
            let engine = commands::build_engine(&config, cache)?;
            commands::manifest(&engine, &path, output.as_deref()).await
        }
        Commands::Serve { port, host, open } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            let engine = commands::build_engine(&config, cache)?;
            commands::serve(engine, config.server, open).await
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats => commands::cache_stats(cache.as_ref()),
            CacheAction::Clear => {
                commands::cache_clear(cache.as_ref());
                Ok(())
            }
        },
        Commands::Version => Ok(()),
    }
}
