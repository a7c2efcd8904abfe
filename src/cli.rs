use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Assemble and cache ADM telemetry datamarts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Probe a dataset export and write its normalized schema to a YAML file
    Probe(ProbeArgs),
    /// Build a datamart from model/predictor exports, filter, and cache it
    Build(BuildArgs),
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Dataset export to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination schema file path
    #[arg(short, long)]
    pub meta: PathBuf,
    /// Delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Directory holding the dataset exports
    #[arg(short = 'p', long = "path", default_value = ".")]
    pub path: PathBuf,
    /// Model data filename hint, relative to --path (defaults to `model_data`)
    #[arg(long = "model")]
    pub model: Option<String>,
    /// Predictor data filename hint, relative to --path (defaults to `predictor_data`)
    #[arg(long = "predictor")]
    pub predictor: Option<String>,
    /// Row-level filters over the normalized model schema, such as `ResponseCount > 100`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Keep the Name column as-is instead of decoding embedded JSON keys
    #[arg(long = "no-extract-keys")]
    pub no_extract_keys: bool,
    /// Materialize and report the combined model/predictor view as well
    #[arg(long = "combined")]
    pub combined: bool,
    /// Write cached snapshots of the validated datasets into this directory
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<PathBuf>,
    /// Delimiter character for reading the exports
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the export files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
