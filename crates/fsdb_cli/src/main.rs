//! fsdb CLI
//!
//! Command-line tools for fsdb table directories.
//!
//! # Commands
//!
//! - `demo` - Populate a directory with sample tables and run a few requests
//! - `exec` - Run a write statement
//! - `query` - Run a select statement
//! - `tables` - List tables and their record counts
//! - `dump` - Print every record of a table

mod commands;

use clap::{Parser, Subcommand};
use commands::{OutputFormat, StoreFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// fsdb command-line tools.
#[derive(Parser)]
#[command(name = "fsdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the table directory
    #[arg(global = true, short, long)]
    dir: Option<PathBuf>,

    /// Table file format
    #[arg(global = true, short, long, value_enum, default_value_t = StoreFormat::Json)]
    format: StoreFormat,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create Products, Customers and Orders, then select, delete and update
    Demo {
        /// Seed for the random orders
        #[arg(long)]
        seed: Option<u64>,

        /// Most orders per customer
        #[arg(long, default_value = "32")]
        max_orders: u32,
    },

    /// Run a write statement, e.g. '"insertInto": "T", "set": {"a": 1}'
    Exec {
        /// Statement text
        statement: String,
    },

    /// Run a select statement, e.g. '"selectFrom": "T", "where": {"a": 1}'
    Query {
        /// Statement text
        statement: String,

        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// List tables and their record counts
    Tables {
        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Print every record of a table
    Dump {
        /// Table name
        table: String,

        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Demo { seed, max_orders } => {
            let dir = cli.dir.ok_or("Directory required for demo")?;
            let summary = commands::demo::run(&dir, cli.format, seed, max_orders)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Exec { statement } => {
            let dir = cli.dir.ok_or("Directory required for exec")?;
            commands::exec::run(&dir, cli.format, &statement)?;
        }
        Commands::Query { statement, output } => {
            let dir = cli.dir.ok_or("Directory required for query")?;
            commands::query::run(&dir, cli.format, &statement, output)?;
        }
        Commands::Tables { output } => {
            let dir = cli.dir.ok_or("Directory required for tables")?;
            commands::tables::run(&dir, cli.format, output)?;
        }
        Commands::Dump { table, output } => {
            let dir = cli.dir.ok_or("Directory required for dump")?;
            commands::dump::run(&dir, cli.format, &table, output)?;
        }
        Commands::Version => {
            println!("fsdb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("fsdb Core v{}", fsdb_core::VERSION);
        }
    }

    Ok(())
}
