//! Run aggregation and the `info.json` run report.

use adorn_core::ImagePlacementRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Result of one completed image unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOutcome {
    pub id: String,
    pub output: PathBuf,
    pub record: ImagePlacementRecord,
}

/// Aggregate of a batch run, folded by a single coordinator.
///
/// Each image id is written at most once, either as a success or as a failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub count: usize,
    pub succeeded: Vec<String>,
    pub failures: BTreeMap<String, String>,
    pub placements: BTreeMap<String, ImagePlacementRecord>,
}

impl BatchReport {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self, outcome: UnitOutcome) {
        if self.is_recorded(&outcome.id) {
            tracing::warn!(image = %outcome.id, "duplicate image id; keeping first result");
            return;
        }
        self.succeeded.push(outcome.id.clone());
        if !outcome.record.is_empty() {
            self.placements.insert(outcome.id, outcome.record);
        }
    }

    pub fn record_failure(&mut self, id: String, message: String) {
        if self.is_recorded(&id) {
            tracing::warn!(image = %id, "duplicate image id; keeping first result");
            return;
        }
        self.failures.insert(id, message);
    }

    fn is_recorded(&self, id: &str) -> bool {
        self.failures.contains_key(id) || self.succeeded.iter().any(|s| s == id)
    }

    /// Total accessories placed across all images.
    pub fn accessories_added(&self) -> usize {
        self.placements.values().map(ImagePlacementRecord::len).sum()
    }
}

/// The `info.json` document written into the run directory.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo<'a> {
    pub script: &'static str,
    pub ts: i64,
    pub source: &'a Path,
    pub output: &'a Path,
    pub count: usize,
    pub accessories_added: &'a BTreeMap<String, ImagePlacementRecord>,
    pub failures: &'a BTreeMap<String, String>,
}

impl<'a> RunInfo<'a> {
    pub fn new(ts: i64, source: &'a Path, output: &'a Path, report: &'a BatchReport) -> Self {
        Self {
            script: "accessorise",
            ts,
            source,
            output,
            count: report.count,
            accessories_added: &report.placements,
            failures: &report.failures,
        }
    }

    pub fn write(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join("info.json");
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}
