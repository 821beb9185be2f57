//! linestore CLI
//!
//! Command-line tools for IDs, table files and blob directories.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use linestore::{inspect_file, BlobRef, BlobStore, IdGenerator, Ksid, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// linestore CLI
#[derive(Parser, Debug)]
#[command(name = "linestore")]
#[command(about = "Inspect and manipulate linestore IDs, tables and blobs")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate and convert IDs
    Id {
        #[command(subcommand)]
        command: IdCommands,
    },

    /// Check a table file and print a summary
    Inspect {
        /// Path to the .jsonl table file
        table: PathBuf,
    },

    /// Read and write blob directories
    Blob {
        #[command(subcommand)]
        command: BlobCommands,
    },
}

#[derive(Subcommand, Debug)]
enum IdCommands {
    /// Mint new IDs
    New {
        /// Number of IDs to print
        #[arg(short, long, default_value = "1")]
        count: usize,

        /// Slice residue owned by this instance
        #[arg(long, default_value = "0")]
        instance: u32,

        /// Number of cooperating instances
        #[arg(long, default_value = "1")]
        total: u32,
    },

    /// Show the fields of encoded IDs
    Decode {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Encode raw 63-bit values
    Encode {
        #[arg(required = true)]
        values: Vec<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum BlobCommands {
    /// Store a file and print its reference
    Put {
        /// Blob directory (e.g. notes.blobs)
        blob_dir: PathBuf,

        /// File to store
        file: PathBuf,
    },

    /// Write a blob's content to stdout
    Cat {
        /// Blob directory (e.g. notes.blobs)
        blob_dir: PathBuf,

        /// Reference (sha256:<hash>-<size>)
        reference: String,
    },
}

fn main() {
    // Logs go to stderr; stdout carries command output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,linestore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Id { command } => match command {
            IdCommands::New {
                count,
                instance,
                total,
            } => {
                let generator = IdGenerator::with_slice(instance, total)?;
                for _ in 0..count {
                    writeln!(out, "{}", generator.new_id())?;
                }
            }
            IdCommands::Decode { ids } => {
                for text in ids {
                    let id = Ksid::decode(&text)?;
                    writeln!(
                        out,
                        "{}\tvalue={}\ttick={}\tslice={}\ttime={}",
                        id,
                        id.as_u64(),
                        id.time10us(),
                        id.slice(),
                        id.time().to_rfc3339()
                    )?;
                }
            }
            IdCommands::Encode { values } => {
                for value in values {
                    writeln!(out, "{}", Ksid::try_from(value)?)?;
                }
            }
        },

        Commands::Inspect { table } => {
            let report = inspect_file(&table)?;
            writeln!(out, "file:      {}", table.display())?;
            writeln!(out, "version:   {}", report.version)?;
            writeln!(out, "columns:")?;
            for column in &report.columns {
                writeln!(out, "  {:<16} {:?}", column.name, column.column_type)?;
            }
            writeln!(out, "rows:      {}", report.rows)?;
            if let (Some(first), Some(last)) = (report.first_id, report.last_id) {
                writeln!(out, "first id:  {} ({})", first, first.time().to_rfc3339())?;
                writeln!(out, "last id:   {} ({})", last, last.time().to_rfc3339())?;
            }
            writeln!(out, "blob refs: {}", report.blob_refs)?;
        }

        Commands::Blob { command } => match command {
            BlobCommands::Put { blob_dir, file } => {
                let store = Arc::new(BlobStore::new(blob_dir));
                let mut writer = store.new_blob()?;
                io::copy(&mut File::open(&file)?, &mut writer)?;
                let blob = writer.finish()?;
                if let Some(reference) = blob.reference() {
                    writeln!(out, "{}", reference)?;
                }
            }
            BlobCommands::Cat {
                blob_dir,
                reference,
            } => {
                let store = BlobStore::new(blob_dir);
                let reference = BlobRef::parse(&reference)?;
                io::copy(&mut store.open(&reference)?, &mut out)?;
            }
        },
    }

    out.flush()?;
    Ok(())
}
