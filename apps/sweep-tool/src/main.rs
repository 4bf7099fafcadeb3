//! Command-line front end for sweep-core.
//!
//! - `sweep`: runs one sweep over a `key<TAB>payload` file and prints each
//!   change as a JSON line on stdout
//! - `inspect`: summarises (or dumps) a persisted snapshot

mod cli;
mod source;

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use anyhow::{bail, Context, Result};
use clap::Parser;
use sweep_core::record::RecordReader;
use sweep_core::snapshot::open_snapshot;
use sweep_core::{RecordFormat, SweepConfig, Sweeper};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, FormatArg, StoreArgs};
use source::{JsonLinesSink, KeyEncoder};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Sweep { store, source, key } => {
            let sweeper = build_sweeper(&store)?;
            let input: Box<dyn BufRead> = if source.as_os_str() == "-" {
                Box::new(io::stdin().lock())
            } else {
                let file = File::open(&source)
                    .with_context(|| format!("failed to open {}", source.display()))?;
                Box::new(BufReader::new(file))
            };

            let encoder = KeyEncoder::new(&key);
            let sink = JsonLinesSink::new(io::stdout().lock());
            let stats = sweeper.try_run(encoder.records(input), sink)?;
            tracing::info!(
                inserted = stats.inserted,
                updated = stats.updated,
                deleted = stats.deleted,
                unchanged = stats.unchanged,
                "done"
            );
        }
        Commands::Inspect { store, dump } => {
            let sweeper = build_sweeper(&store)?;
            let info = sweeper.inspect()?;
            println!("{}", serde_json::to_string_pretty(&info)?);

            if dump && info.exists {
                let mut reader = open_snapshot(sweeper.paths(), sweeper.config())?;
                while let Some(record) = reader.read()? {
                    println!("{}\t{}", hex::encode(&record.key), hex::encode(&record.payload));
                }
            }
        }
    }

    Ok(())
}

/// Merges the config file with command-line overrides.
fn build_sweeper(store: &StoreArgs) -> Result<Sweeper> {
    let mut config = match &store.config {
        Some(path) => SweepConfig::from_json_file(path)?,
        None => SweepConfig::default(),
    };
    if let Some(dir) = &store.data_dir {
        config.data_dir = dir.clone();
    }
    match store.format {
        Some(FormatArg::Framed) => config.format = RecordFormat::Framed,
        Some(FormatArg::Fixed) => {
            let (Some(id_size), Some(data_size)) = (store.id_size, store.data_size) else {
                bail!("--format fixed requires --id-size and --data-size");
            };
            config.format = RecordFormat::FixedWidth { id_size, data_size };
        }
        None => {}
    }
    Ok(Sweeper::new(config, store.name.as_str())?)
}
