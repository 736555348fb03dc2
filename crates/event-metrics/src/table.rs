//! The flat metrics table (`metric,value,updated_at`).
//!
//! Rows come from a template; a metric can only be updated if its row
//! already exists. Unknown names are reported and ignored.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use terra_common::{TerraError, TerraResult};

/// One metric row. An empty `value` means not computed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub metric: String,
    pub value: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MetricRow {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            value: None,
            updated_at: None,
        }
    }
}

/// Result of [`MetricsTable::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    UnknownMetric,
}

/// In-memory metrics table with CSV persistence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    rows: Vec<MetricRow>,
}

impl MetricsTable {
    /// Table with one empty row per metric name.
    pub fn from_template<I, S>(metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: metrics.into_iter().map(MetricRow::new).collect(),
        }
    }

    /// Read a table from CSV.
    pub fn load(path: impl AsRef<Path>) -> TerraResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| TerraError::Storage(format!("failed to open metrics table {}: {}", path.display(), e)))?;
        let mut reader = csv::Reader::from_reader(file);

        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: MetricRow = record.map_err(|e| {
                TerraError::Serialization(format!("invalid row in metrics table {}: {}", path.display(), e))
            })?;
            rows.push(row);
        }
        debug!(path = %path.display(), rows = rows.len(), "Loaded metrics table");
        Ok(Self { rows })
    }

    /// Write the table as CSV, replacing `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> TerraResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TerraError::Storage(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| TerraError::Storage(format!("failed to create metrics table {}: {}", path.display(), e)))?;
        for row in &self.rows {
            writer
                .serialize(row)
                .map_err(|e| TerraError::Serialization(format!("failed to write metric '{}': {}", row.metric, e)))?;
        }
        writer
            .flush()
            .map_err(|e| TerraError::Storage(format!("failed to flush {}: {}", path.display(), e)))?;
        info!(path = %path.display(), rows = self.rows.len(), "Saved metrics table");
        Ok(())
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn get(&self, metric: &str) -> Option<&MetricRow> {
        self.rows.iter().find(|r| r.metric == metric)
    }

    pub fn value(&self, metric: &str) -> Option<f64> {
        self.get(metric).and_then(|r| r.value)
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.get(metric).is_some()
    }

    /// Set the value of an existing metric, stamped with the current time.
    pub fn update(&mut self, metric: &str, value: Option<f64>) -> UpdateOutcome {
        self.update_at(metric, value, Utc::now())
    }

    pub fn update_at(&mut self, metric: &str, value: Option<f64>, at: DateTime<Utc>) -> UpdateOutcome {
        match self.rows.iter_mut().find(|r| r.metric == metric) {
            Some(row) => {
                row.value = value;
                row.updated_at = Some(at);
                debug!(metric, value = ?value, "Updated metric");
                UpdateOutcome::Updated
            }
            None => {
                warn!(metric, "Metric not found in table template; value ignored");
                UpdateOutcome::UnknownMetric
            }
        }
    }
}
