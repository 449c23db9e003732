//! bootpack-inspect: look inside a bootpack archive without running it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bootpack::{inspect, observability};
use bootpack_archive::Archive;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bootpack-inspect")]
#[command(about = "Inspect a bootpack archive (embedded or standalone)")]
#[command(version)]
struct Cli {
    /// Executable or container file to inspect
    archive: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List TOC entries in stored order
    List {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Write one entry's decoded payload
    Extract {
        /// Entry name as stored in the TOC
        name: String,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the cookie fields
    Info {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();
    let archive = Archive::open(&cli.archive)
        .with_context(|| format!("cannot open archive {}", cli.archive.display()))?;

    match cli.command {
        Command::List { json } => {
            let entries = inspect::entries(&archive)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", inspect::render_table(&entries));
            }
        }
        Command::Extract { name, output } => {
            let written = inspect::extract(&archive, &name, output.as_deref())?;
            if let Some(path) = output {
                eprintln!("wrote {} bytes to {}", written, path.display());
            }
        }
        Command::Info { json } => {
            let info = inspect::info(&archive)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print!("{}", inspect::render_info(&info));
            }
        }
    }
    Ok(())
}
