//! Datum: an in-memory annotated dataset store.
//!
//! Datum holds a computer-vision dataset as two linked tables: entries (one
//! per image or sample) and observables (one per annotation attached to an
//! entry). The store keeps the links consistent through every mutation,
//! cascades deletes, and never reuses an id. Declarative mappers rewrite
//! attributes in bulk, and stores can be merged without id collisions.
//!
//! # Modules
//!
//! - [`record`]: Entry and Observable records, ids and attribute values
//! - [`store`]: The dataset store, filters and merging
//! - [`transform`]: Mappers and the attributes transformer
//! - [`validation`]: Store integrity audit
//! - [`registry`]: On-disk catalog of named datasets
//! - [`error`]: Error types for datum operations

pub mod error;
pub mod record;
pub mod registry;
pub mod store;
pub mod transform;
pub mod validation;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use crate::registry::Registry;

pub use error::DatumError;

/// The datum CLI application.
#[derive(Parser)]
#[command(name = "datum")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding the datastore catalogs.
    #[arg(long, global = true, env = "DATUM_REGISTRY", default_value = "datastores")]
    registry: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Register a formatted dataset directory under a name.
    Register(RegisterArgs),
    /// List datastores and the datasets they hold.
    List(ListArgs),
    /// Print the root directory of a registered dataset.
    Resolve(ResolveArgs),
}

/// Arguments for the register subcommand.
#[derive(clap::Args)]
struct RegisterArgs {
    /// Root directory of the dataset.
    root: PathBuf,

    /// Name to register the dataset under.
    #[arg(long)]
    name: String,

    /// Datastore to register into (created if missing).
    #[arg(long)]
    datastore: String,
}

/// Arguments for the list subcommand.
#[derive(clap::Args)]
struct ListArgs {
    /// Only list this datastore.
    #[arg(long)]
    datastore: Option<String>,

    /// Output format.
    #[arg(long, default_value = "text", value_enum)]
    output: OutputFormat,
}

/// Output formats for the list subcommand.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable listing.
    Text,
    /// JSON object keyed by datastore.
    Json,
}

/// Arguments for the resolve subcommand.
#[derive(clap::Args)]
struct ResolveArgs {
    /// Dataset name, or `datastore.name`.
    name: String,

    /// Datastore to look in.
    #[arg(long)]
    datastore: Option<String>,
}

/// Run the datum CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), DatumError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Register(args)) => run_register(&cli.registry, args),
        Some(Commands::List(args)) => run_list(&cli.registry, args),
        Some(Commands::Resolve(args)) => run_resolve(&cli.registry, args),
        None => {
            println!("datum {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("In-memory annotated dataset store.");
            println!();
            println!("Run 'datum --help' for usage information.");
            Ok(())
        }
    }
}

fn run_register(dir: &Path, args: RegisterArgs) -> Result<(), DatumError> {
    let mut registry = Registry::open(dir)?;
    registry.register(&args.root, &args.name, &args.datastore)?;
    println!(
        "Registered {}.{} -> {}",
        args.datastore,
        args.name,
        args.root.display()
    );
    Ok(())
}

fn run_list(dir: &Path, args: ListArgs) -> Result<(), DatumError> {
    let registry = Registry::open(dir)?;

    let stores: Vec<&str> = match args.datastore.as_deref() {
        Some(store) => {
            registry.datasets(store)?;
            vec![store]
        }
        None => registry.datastores().collect(),
    };

    match args.output {
        OutputFormat::Json => {
            let mut listing = serde_json::Map::new();
            for store in stores {
                let datasets = serde_json::to_value(registry.datasets(store)?).map_err(|e| {
                    DatumError::MalformedCatalog {
                        path: registry.catalog_path(store),
                        message: e.to_string(),
                    }
                })?;
                listing.insert(store.to_string(), datasets);
            }
            let text = serde_json::to_string_pretty(&listing).map_err(|e| {
                DatumError::MalformedCatalog {
                    path: registry.dir().to_path_buf(),
                    message: e.to_string(),
                }
            })?;
            println!("{}", text);
        }
        OutputFormat::Text if args.datastore.is_none() => print!("{}", registry),
        OutputFormat::Text => {
            for store in stores {
                println!("Datastore {} ({})", store, registry.catalog_path(store).display());
                for dataset in registry.datasets(store)? {
                    println!("  {}.{} -> {}", store, dataset.name, dataset.root.display());
                }
            }
        }
    }
    Ok(())
}

fn run_resolve(dir: &Path, args: ResolveArgs) -> Result<(), DatumError> {
    let registry = Registry::open(dir)?;
    let root = registry.resolve(&args.name, args.datastore.as_deref())?;
    println!("{}", root.display());
    Ok(())
}
