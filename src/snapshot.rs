use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{scenario::SimulationParams, stats::StatsSnapshot};

/// One recorded observation of a run: what a history store keeps per entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub stats: StatsSnapshot,
    pub params: SimulationParams,
}

impl RunRecord {
    pub fn new(id: impl Into<String>, stats: StatsSnapshot, params: SimulationParams) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            stats,
            params,
        }
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes a [`RunRecord`] to `<dir>/<scenario>/step_NNNNNN.json` every
/// `interval_steps` steps. An interval of zero disables writing.
pub struct SnapshotWriter {
    dir: PathBuf,
    interval_steps: u64,
}

impl SnapshotWriter {
    pub fn new(dir: impl AsRef<Path>, interval_steps: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            interval_steps,
        }
    }

    pub fn is_due(&self, step: u64) -> bool {
        self.interval_steps != 0 && step % self.interval_steps == 0
    }

    pub fn maybe_write(
        &self,
        step: u64,
        scenario_name: &str,
        stats: &StatsSnapshot,
        params: &SimulationParams,
    ) -> Result<Option<PathBuf>, SnapshotError> {
        if !self.is_due(step) {
            return Ok(None);
        }

        let dir = self.dir.join(scenario_name);
        fs::create_dir_all(&dir)?;
        let file_path = dir.join(format!("step_{step:06}.json"));
        let record = RunRecord::new(
            format!("{scenario_name}/step_{step:06}"),
            stats.clone(),
            params.clone(),
        );
        fs::write(&file_path, serde_json::to_string_pretty(&record)?)?;
        Ok(Some(file_path))
    }
}

pub fn load_record(path: impl AsRef<Path>) -> Result<RunRecord, SnapshotError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}
