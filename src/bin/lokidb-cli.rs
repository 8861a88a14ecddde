//! lokidb CLI entry point
//!
//! A thin demonstration binary over the library - never touches
//! subsystems directly, only `lokidb::db`/`lokidb::collection`.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde_json::json;

use lokidb::db::{Database, DatabaseOptions, FileStorageAdapter};
use lokidb::CollectionOptions;

/// lokidb - an in-memory, schemaless document database
#[derive(Parser, Debug)]
#[command(name = "lokidb")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a snapshot file and print a summary of its collections
    Inspect {
        /// Path to a serialized database file
        snapshot_file: PathBuf,
    },
    /// Insert `n` synthetic documents into an in-memory collection and
    /// report throughput
    Bench {
        /// Number of documents to insert
        n: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Inspect { snapshot_file } => inspect(&snapshot_file),
        Command::Bench { n } => bench(n),
    };

    if let Err(message) = result {
        eprintln!("{}", json!({"status": "error", "message": message}));
        process::exit(1);
    }
}

fn inspect(snapshot_file: &PathBuf) -> Result<(), String> {
    let dir = snapshot_file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let name = snapshot_file
        .file_name()
        .ok_or_else(|| "snapshot path has no file name".to_string())?
        .to_string_lossy()
        .to_string();

    let adapter = FileStorageAdapter::new(dir);
    let mut db = Database::new(name, DatabaseOptions::default());
    db.load_from(&adapter).map_err(|e| e.to_string())?;

    for collection_name in db.collection_names() {
        let coll = db.get_collection(collection_name).expect("listed by collection_names");
        println!(
            "{}",
            json!({
                "collection": collection_name,
                "count": coll.len(),
                "max_id": coll.max_id(),
            })
        );
    }
    Ok(())
}

fn bench(n: usize) -> Result<(), String> {
    let mut coll = lokidb::Collection::new(
        "bench",
        CollectionOptions {
            indices: vec!["value".to_string()],
            adaptive_binary_indices: true,
            ..Default::default()
        },
    );

    let start = Instant::now();
    for i in 0..n {
        coll.insert(json!({"value": i})).map_err(|e| e.to_string())?;
    }
    let elapsed = start.elapsed();

    println!(
        "{}",
        json!({
            "inserted": n,
            "elapsed_ms": elapsed.as_millis(),
            "docs_per_sec": if elapsed.as_secs_f64() > 0.0 { n as f64 / elapsed.as_secs_f64() } else { f64::INFINITY },
        })
    );
    Ok(())
}
