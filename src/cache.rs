//! Snapshot caching: durable, timestamp-paired persistence of the
//! datamart's datasets.
//!
//! One timestamp is generated per save call so a model/predictor pair
//! written together is recognizably paired by name. Writes are
//! independent: a failure is reported per artifact and a sibling write
//! that already completed stays on disk.

use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;

use crate::data::Value;
use crate::error::{DatamartError, Result};
use crate::frame::DataFrame;
use crate::io_utils::{self, DEFAULT_CSV_DELIMITER};
use crate::lazy::LazyFrame;

/// Materializes and persists whichever datasets are present, as
/// `cached_model_data_<ts>.csv` / `cached_predictor_data_<ts>.csv` under
/// `path`. Returns the written locations, absent per absent dataset.
pub fn save_data(
    model: Option<&LazyFrame>,
    predictor: Option<&LazyFrame>,
    path: &Path,
) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
    let stamp = Local::now().format("%Y%m%dT%H%M%S%.3f").to_string();

    let mut model_cache = None;
    if let Some(lazy) = model {
        let frame = lazy.collect()?;
        let artifact = path.join(format!("cached_model_data_{stamp}.csv"));
        write_artifact(&artifact, &frame)?;
        info!("Cached {} model row(s) to {artifact:?}", frame.row_count());
        model_cache = Some(artifact);
    }

    let mut predictor_cache = None;
    if let Some(lazy) = predictor {
        let frame = lazy.collect()?;
        let artifact = path.join(format!("cached_predictor_data_{stamp}.csv"));
        write_artifact(&artifact, &frame)?;
        info!(
            "Cached {} predictor row(s) to {artifact:?}",
            frame.row_count()
        );
        predictor_cache = Some(artifact);
    }

    Ok((model_cache, predictor_cache))
}

fn write_artifact(artifact: &Path, frame: &DataFrame) -> Result<()> {
    write_frame(artifact, frame).map_err(|source| DatamartError::Storage {
        artifact: artifact.to_path_buf(),
        source: source.into(),
    })
}

fn write_frame(path: &Path, frame: &DataFrame) -> anyhow::Result<()> {
    let mut writer = io_utils::open_csv_writer_to_path(path, DEFAULT_CSV_DELIMITER)?;
    writer.write_record(frame.column_names())?;
    for row in &frame.rows {
        writer.write_record(
            row.iter()
                .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(())
}
