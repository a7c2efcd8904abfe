pub mod cache;
pub mod categorize;
pub mod cli;
pub mod data;
pub mod datamart;
pub mod derive;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod io_utils;
pub mod keys;
pub mod lazy;
pub mod query;
pub mod schema;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};
use crate::datamart::{Datamart, DatamartOptions};
use crate::query::QueryExpr;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("adm_datamart", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Build(args) => handle_build(&args),
    }
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let frame = ingest::read_frame(&args.input, delimiter, encoding)
        .with_context(|| format!("Reading dataset export {:?}", args.input))?;
    let frame = schema::normalize_columns(frame);
    let doc = schema::Schema::from_frame(&frame);
    doc.save(&args.meta)
        .with_context(|| format!("Writing schema to {:?}", args.meta))?;
    info!(
        "Normalized schema for {} column(s) written to {:?}",
        doc.columns.len(),
        args.meta
    );
    Ok(())
}

fn handle_build(args: &cli::BuildArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let options = DatamartOptions {
        query: args.filters.iter().map(|f| QueryExpr::new(f)).collect(),
        extract_name_keys: !args.no_extract_keys,
        categorization: None,
    };
    let datamart = Datamart::from_ds_export(
        &args.path,
        args.model.as_deref(),
        args.predictor.as_deref(),
        args.delimiter,
        encoding,
        options,
    )
    .with_context(|| format!("Building datamart from {:?}", args.path))?;

    info!("Context keys: {}", datamart.context_keys().iter().join(", "));
    if let Some(model) = datamart.model_data() {
        let frame = model.collect().context("Materializing model data")?;
        info!(
            "Model data: {} row(s), {} column(s)",
            frame.row_count(),
            frame.columns.len()
        );
    }
    if let Some(predictor) = datamart.predictor_data() {
        let frame = predictor.collect().context("Materializing predictor data")?;
        info!(
            "Predictor data: {} row(s), {} column(s)",
            frame.row_count(),
            frame.columns.len()
        );
    }
    if args.combined {
        match datamart.combined_data() {
            Some(combined) => {
                let frame = combined.collect().context("Materializing combined view")?;
                info!(
                    "Combined view: {} row(s), {} column(s)",
                    frame.row_count(),
                    frame.columns.len()
                );
            }
            None => info!("Combined view unavailable: a source dataset is absent"),
        }
    }
    if let Some(dir) = &args.cache_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Creating cache directory {dir:?}"))?;
        let (model_cache, predictor_cache) = datamart.save_data(dir)?;
        if let Some(path) = model_cache {
            info!("Model cache written to {path:?}");
        }
        if let Some(path) = predictor_cache {
            info!("Predictor cache written to {path:?}");
        }
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
