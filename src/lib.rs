pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod fields;
pub mod import;
pub mod inspect;
pub mod mapping;
pub mod sheet;
pub mod store;
pub mod table;
pub mod validate;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, ImportArgs, JobArgs},
    config::{Settings, resolve_encoding},
    import::Importer,
    sheet::CsvOptions,
    store::JsonStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sales_import", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => handle_import(&args),
        Commands::Inspect(args) => inspect::execute(&args),
        Commands::Job(args) => handle_job(&args),
        Commands::Errors(args) => handle_errors(&args),
    }
}

fn load_settings(
    config: Option<&std::path::Path>,
    store: Option<&std::path::Path>,
) -> Result<Settings> {
    let mut settings = Settings::load(config).context("Loading settings")?;
    if let Some(dir) = store {
        settings.store_dir = dir.to_path_buf();
    }
    debug!("Using store directory {:?}", settings.store_dir);
    Ok(settings)
}

fn handle_import(args: &ImportArgs) -> Result<()> {
    let settings = load_settings(args.config.as_deref(), args.store.as_deref())?;
    let mut store = JsonStore::open(&settings.store_dir)?;
    let defaults = settings.csv_options()?;
    let csv_options = CsvOptions {
        delimiter: args.delimiter.or(defaults.delimiter),
        encoding: match &args.input_encoding {
            Some(label) => resolve_encoding(Some(label))?,
            None => defaults.encoding,
        },
    };
    info!("{}: importing {:?}", settings.app_name, args.input);
    let bytes = fs::read(&args.input).with_context(|| format!("Reading {:?}", args.input))?;
    let filename = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut importer = Importer::new(&mut store, &settings)?.with_csv_options(csv_options);
    let result = importer
        .import(&filename, &bytes, args.correlation_id.as_deref())
        .with_context(|| format!("Importing {:?}", args.input))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!("Job {}: {}", result.job_id, result.status);
    if let Some(format) = &result.format {
        println!("Layout: {format}");
    }
    println!(
        "Rows: {} total, {} imported, {} failed",
        result.total_rows, result.imported_rows, result.failed_rows
    );
    if let Some(message) = &result.message {
        println!("{message}");
    }
    if !result.errors.is_empty() {
        table::print_errors(&result.errors);
    }
    Ok(())
}

fn handle_job(args: &JobArgs) -> Result<()> {
    let settings = load_settings(args.config.as_deref(), args.store.as_deref())?;
    let mut store = JsonStore::open(&settings.store_dir)?;
    let importer = Importer::new(&mut store, &settings)?;
    let job = importer.job(args.id)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }
    println!("{}: job {}", settings.app_name, job.id);
    let headers = ["field", "value"].map(String::from).to_vec();
    let rows = [
        ("id", job.id.to_string()),
        ("correlation_id", job.correlation_id.clone()),
        ("filename", job.filename.clone()),
        ("status", job.status.to_string()),
        ("total_rows", job.total_rows.to_string()),
        ("imported_rows", job.imported_rows.to_string()),
        ("failed_rows", job.failed_rows.to_string()),
        ("message", job.message.clone().unwrap_or_default()),
        ("created_at", job.created_at.to_rfc3339()),
        ("updated_at", job.updated_at.to_rfc3339()),
    ]
    .into_iter()
    .map(|(field, value)| vec![field.to_string(), value])
    .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    Ok(())
}

fn handle_errors(args: &JobArgs) -> Result<()> {
    let settings = load_settings(args.config.as_deref(), args.store.as_deref())?;
    let mut store = JsonStore::open(&settings.store_dir)?;
    let importer = Importer::new(&mut store, &settings)?;
    let errors = importer.job_errors(args.id)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&errors)?);
        return Ok(());
    }
    if errors.is_empty() {
        info!("Job {} has no row errors", args.id);
        return Ok(());
    }
    table::print_errors(&errors);
    Ok(())
}
