//! vibelog-store CLI
//!
//! Inspect and edit a directory-backed store from the command line.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};
use vibelog_store::{Config, FileBackend, FlushPolicy, Store};

/// vibelog-store CLI
#[derive(Parser, Debug)]
#[command(name = "vibelog-store")]
#[command(about = "Inspect a chunked, compressed vibelog store")]
#[command(version)]
struct Args {
    /// Data directory (one file per storage key)
    #[arg(short, long, default_value = "./vibelog_data")]
    data_dir: String,

    /// Storage key prefix
    #[arg(short, long, default_value = "vl_")]
    prefix: String,

    /// Chunk size threshold in UTF-16 code units
    #[arg(long, default_value = "500000")]
    chunk_size: usize,

    /// Write chunks uncompressed
    #[arg(long)]
    no_compression: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key to a JSON value (plain text is stored as a string)
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// Go through the write queue and WAL instead of writing through
        #[arg(long)]
        queued: bool,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List all keys
    Keys,

    /// Print storage statistics as JSON
    Stats,

    /// Remove everything the store owns
    Clear,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vibelog_store=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .prefix(&args.prefix)
        .chunk_size(args.chunk_size)
        .compression(!args.no_compression)
        .flush_policy(FlushPolicy::Manual)
        .build();

    let backend = match FileBackend::open(&args.data_dir) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("Failed to open {}: {}", args.data_dir, e);
            return ExitCode::FAILURE;
        }
    };

    let store = match Store::open(backend, config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let ok = run(&store, args.command);

    if let Err(e) = store.close() {
        tracing::error!("Failed to flush on close: {}", e);
        return ExitCode::FAILURE;
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run(store: &Store<FileBackend>, command: Commands) -> bool {
    match command {
        Commands::Get { key } => match store.get(&key) {
            Some(value) => {
                println!("{}", value);
                true
            }
            None => {
                println!("(nil)");
                true
            }
        },
        Commands::Set { key, value, queued } => {
            let value: Value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            match store.set(&key, &value, !queued) {
                Ok(written) => {
                    println!("{}", if written { "OK" } else { "FAILED" });
                    written
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    false
                }
            }
        }
        Commands::Del { key } => {
            let deleted = store.delete(&key);
            println!("{}", if deleted { "OK" } else { "FAILED" });
            deleted
        }
        Commands::Keys => {
            for key in store.keys() {
                println!("{}", key);
            }
            true
        }
        Commands::Stats => match serde_json::to_string_pretty(&store.stats()) {
            Ok(json) => {
                println!("{}", json);
                true
            }
            Err(e) => {
                tracing::error!("Failed to render stats: {}", e);
                false
            }
        },
        Commands::Clear => {
            let cleared = store.clear();
            println!("{}", if cleared { "OK" } else { "FAILED" });
            cleared
        }
    }
}
