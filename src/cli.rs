use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Import sales and finance spreadsheets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate a spreadsheet and upsert its valid rows into the store
    Import(ImportArgs),
    /// Show the detected layout, missing columns and a canonical preview without storing anything
    Inspect(InspectArgs),
    /// Show a stored import job
    Job(JobArgs),
    /// List the row errors recorded for an import job
    Errors(JobArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Spreadsheet (.xlsx, .xls) or CSV file to import
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Settings YAML file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Store directory (overrides settings)
    #[arg(long = "store")]
    pub store: Option<PathBuf>,
    /// Correlation id recorded on the job (random when omitted)
    #[arg(long = "correlation-id")]
    pub correlation_id: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of CSV input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Print the import result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Spreadsheet (.xlsx, .xls) or CSV file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of canonical rows to preview
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of CSV input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct JobArgs {
    /// Import job id
    #[arg(long)]
    pub id: u64,
    /// Settings YAML file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Store directory (overrides settings)
    #[arg(long = "store")]
    pub store: Option<PathBuf>,
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
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
