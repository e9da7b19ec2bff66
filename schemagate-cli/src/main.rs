//! SchemaGate CLI
//!
//! ```bash
//! schemagate check --catalog catalog.json
//! JWT_SECRET=... schemagate serve --catalog catalog.json --port 8080
//! ```
//!
//! See `schemagate --help` for all available commands and options.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "schemagate", about = "Serve declared schemas as guarded CRUD routes", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve every route of a catalog under /dynamic
    Serve {
        /// Catalog file (JSON) with projects and schemas
        #[arg(long)]
        catalog: PathBuf,

        /// Config file, defaults to ./schemagate.toml when present
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate a catalog file and print its routes
    Check {
        /// Catalog file (JSON) with projects and schemas
        #[arg(long)]
        catalog: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { catalog, config, port } => {
            commands::serve::run(&catalog, config.as_deref(), port).await
        }
        Commands::Check { catalog } => commands::check::run(&catalog).map(|summary| print!("{}", summary)),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
