//! adorn-batch — Accessorise runs over a directory of avatars.
//!
//! Loads the catalog once, discovers input images, runs every image as an
//! independent unit and writes the `info.json` run report.

pub mod config;
pub mod engine;
pub mod report;

pub use config::Config;
pub use engine::{Engine, UnitError};
pub use report::{BatchReport, RunInfo, UnitOutcome};

use adorn_io::IoError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("run directory {path}: {source}")]
    RunDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing run report: {0}")]
    Report(#[source] std::io::Error),
}

/// A finished run: where it wrote and what happened.
#[derive(Debug)]
pub struct RunSummary {
    pub ts: i64,
    pub run_dir: PathBuf,
    pub info_path: PathBuf,
    pub report: BatchReport,
}

/// Accessorise every image under `input`, pairing each with
/// `<face_dir>/<stem>.json`.
///
/// Per-image failures land in the report; only setup problems (no images,
/// bad catalog, unwritable output) fail the run.
pub async fn accessorise(config: &Config, input: &Path, face_dir: &Path) -> Result<RunSummary, BatchError> {
    let ts = chrono::Utc::now().timestamp_millis();
    let run_dir = config.run_dir(ts);
    std::fs::create_dir_all(&run_dir).map_err(|source| BatchError::RunDir {
        path: run_dir.clone(),
        source,
    })?;
    tracing::info!(run_dir = %run_dir.display(), "output directory");

    let catalog = adorn_io::load_catalog(config.catalog_path(), &config.asset_dir)?;
    let images = adorn_io::discover_images(input)?;
    let units = adorn_io::pair_with_face_data(images, face_dir);

    let engine = Engine::new(config, Arc::new(catalog), run_dir.clone());
    let report = engine.run(units).await;

    let info_path = RunInfo::new(ts, input, &run_dir, &report)
        .write(&run_dir)
        .map_err(BatchError::Report)?;

    Ok(RunSummary {
        ts,
        run_dir,
        info_path,
        report,
    })
}
