//! MDR CLI
//!
//! Command-line interface for the metadata repository

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "mdr")]
#[command(about = "MDR - Versioned clinical metadata library", long_about = None)]
struct Cli {
    /// TOML configuration file (default: ./mdr.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Author recorded on every change
    #[arg(long, global = true, default_value = "cli")]
    author: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending schema migrations and list them
    Migrate,
    /// Library administration
    Library(commands::library::LibraryArgs),
    /// Lifecycle operations on versioned items
    Item(commands::item::ItemArgs),
    /// Study-scoped structural updates
    Study(commands::study::StudyArgs),
    /// Cache diagnostics
    Cache(commands::cache::CacheArgs),
}

fn main() {
    let cli = Cli::parse();
    let global = commands::GlobalArgs {
        config: cli.config,
        db: cli.db,
        author: cli.author,
    };

    let result = match cli.command {
        Commands::Migrate => commands::migrate::execute(&global),
        Commands::Library(args) => commands::library::execute(&global, args),
        Commands::Item(args) => commands::item::execute(&global, args),
        Commands::Study(args) => commands::study::execute(&global, args),
        Commands::Cache(args) => commands::cache::execute(&global, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
