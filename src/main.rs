//! # Ontodex CLI (`odx`)
//!
//! The `odx` binary indexes RDF documents into a dataset's triple-store
//! graphs and search documents, and reads the SQLite index back.
//!
//! ## Usage
//!
//! ```bash
//! odx --config ./config/odx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `odx init` | Create the SQLite database and run schema migrations |
//! | `odx index <file> --dataset <uri>` | Index an RDF document into a dataset |
//! | `odx project <file> --dataset <uri>` | Print projected documents as JSON, write nothing |
//! | `odx search "<query>"` | Keyword search over the SQLite index |
//! | `odx get <uri> --dataset <uri>` | Print a stored document |
//! | `odx fields` | List the persisted field schema |
//! | `odx cache invalidate <region>` | Send an invalidation signal |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `warn`), so stdout stays parseable.
//!
//! Exit codes: `0` success, `2` for a rejected submission (parse error or
//! conflict), `1` for everything else.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ontodex::config;
use ontodex::engine::build_engine;
use ontodex::get;
use ontodex::migrate;
use ontodex::rdf_input::InputFormat;
use ontodex::search;
use ontodex::submit::{self, IndexOptions};
use ontodex_core::cache::{CacheInvalidator, CacheRegion};
use ontodex_core::error::IndexingError;

/// Ontodex: project RDF datasets into a search index.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/odx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "odx",
    about = "Ontodex: project RDF datasets into a search index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/odx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent.
    Init,

    /// Index an RDF document into a dataset.
    ///
    /// Loads the dataset description and instances into the dataset graph,
    /// reification statements into the reification graph, then projects
    /// and indexes every instance.
    Index {
        /// RDF file to index.
        file: PathBuf,

        /// Dataset IRI.
        #[arg(long)]
        dataset: String,

        /// Input syntax; guessed from the file extension when omitted.
        #[arg(long, value_parser = parse_format)]
        format: Option<InputFormat>,

        /// Fail if any record already exists in the dataset.
        #[arg(long)]
        create: bool,

        /// Resolve predicates within this ontology only.
        #[arg(long)]
        scope: Option<String>,

        /// Run as a background task; Ctrl-C cancels at the next stage.
        #[arg(long)]
        background: bool,
    },

    /// Project an RDF document and print the documents as JSON.
    Project {
        file: PathBuf,

        #[arg(long)]
        dataset: String,

        #[arg(long, value_parser = parse_format)]
        format: Option<InputFormat>,

        #[arg(long)]
        scope: Option<String>,
    },

    /// Keyword search over the SQLite index.
    Search {
        query: String,

        /// Only documents of this dataset.
        #[arg(long)]
        dataset: Option<String>,

        #[arg(long, default_value_t = 10)]
        limit: i64,

        /// Print value counts of this field over all matches.
        #[arg(long)]
        facet: Option<String>,
    },

    /// Print a stored document.
    Get {
        uri: String,

        #[arg(long)]
        dataset: String,
    },

    /// List the persisted field schema.
    Fields,

    /// Cache maintenance.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Invalidate one cache region.
    Invalidate {
        /// Region name, e.g. `search` or `ontology-class-hierarchy`.
        region: String,
    },
}

fn parse_format(s: &str) -> Result<InputFormat, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let client_error = e
                .downcast_ref::<IndexingError>()
                .map(IndexingError::is_client_error)
                .unwrap_or(false);
            if client_error {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index {
            file,
            dataset,
            format,
            create,
            scope,
            background,
        } => {
            let opts = IndexOptions {
                format,
                create,
                scope,
                background,
            };
            submit::run_index(&cfg, &file, &dataset, opts).await?;
        }
        Commands::Project {
            file,
            dataset,
            format,
            scope,
        } => {
            submit::run_project(&cfg, &file, &dataset, format, scope).await?;
        }
        Commands::Search {
            query,
            dataset,
            limit,
            facet,
        } => {
            search::run_search(&cfg, &query, dataset, limit, facet).await?;
        }
        Commands::Get { uri, dataset } => {
            get::run_get(&cfg, &dataset, &uri).await?;
        }
        Commands::Fields => {
            get::run_fields(&cfg).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Invalidate { region } => {
                let region: CacheRegion = region.parse().map_err(anyhow::Error::msg)?;
                let engine = build_engine(&cfg).await?;
                engine.invalidator.invalidate(region).await;
                engine.close().await;
                println!("Invalidated {}.", region);
            }
        },
    }

    Ok(())
}
