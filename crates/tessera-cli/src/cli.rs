use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Tessera: chunked blob storage over a document store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (defaults to ./tessera.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store snapshot file, overriding the configuration
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Bucket name, overriding the configuration
    #[arg(long, global = true)]
    pub bucket: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a file as a new blob
    Put(PutArgs),
    /// Write a blob's content by key
    Get(GetArgs),
    /// Write one version of a named blob
    Fetch(FetchArgs),
    /// List stored filenames
    Ls(LsArgs),
    /// List every version of a filename, oldest first
    Versions(VersionsArgs),
    /// Delete a blob
    Rm(RmArgs),
    /// Check whether a blob exists
    Exists(ExistsArgs),
    /// Recompute a blob's checksum from its chunks
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub file: PathBuf,
    /// Stored filename (defaults to the file's name)
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub content_type: Option<String>,
    #[arg(long)]
    pub chunk_size: Option<u64>,
    /// Use this key instead of a generated one
    #[arg(long)]
    pub key: Option<String>,
    /// Extra metadata field, as NAME=VALUE
    #[arg(long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct FetchArgs {
    pub name: String,
    /// -1 is the latest version, 0 the oldest
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub version: i64,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct LsArgs {}

#[derive(Args)]
pub struct VersionsArgs {
    pub name: String,
}

#[derive(Args)]
pub struct RmArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ExistsArgs {
    pub key: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub key: String,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got `{raw}`")),
    }
}
