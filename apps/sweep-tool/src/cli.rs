use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare a key-ordered source file against the snapshot and print changes
    Sweep {
        #[command(flatten)]
        store: StoreArgs,

        /// Source file of `key<TAB>payload` lines, or `-` for stdin
        #[arg(short, long)]
        source: PathBuf,

        #[command(flatten)]
        key: KeyArgs,
    },

    /// Print record count and checksum of the persisted snapshot
    Inspect {
        #[command(flatten)]
        store: StoreArgs,

        /// Also print every record, hex-encoded
        #[arg(long)]
        dump: bool,
    },
}

/// Where the snapshot lives and how it is framed.
#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Logical snapshot name
    #[arg(short, long)]
    pub name: String,

    /// Data directory, overrides the config file
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Record framing, overrides the config file
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Key width for the fixed format
    #[arg(long)]
    pub id_size: Option<usize>,

    /// Payload width for the fixed format
    #[arg(long)]
    pub data_size: Option<usize>,
}

/// How source keys are encoded.
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Type of the key column
    #[arg(long, value_enum, default_value_t = KeyType::I64)]
    pub key_type: KeyType,

    /// Declared length in characters of text keys
    #[arg(long, default_value_t = 32)]
    pub text_chars: usize,

    /// Declared width in bytes of hex keys
    #[arg(long, default_value_t = 16)]
    pub hex_bytes: usize,

    /// Compare text keys case-insensitively
    #[arg(long)]
    pub ignore_case: bool,

    /// Source is sorted in descending key order
    #[arg(long)]
    pub descending: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Framed,
    Fixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KeyType {
    I64,
    I32,
    Text,
    Hex,
}
