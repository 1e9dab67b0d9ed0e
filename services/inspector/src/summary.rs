//! Per-dataset summaries of a log.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use datadict::{datadict_to_meshgrid, DataDict, FieldInfo, Meta};
use datadict_storage::{datadict_from_ddz, record_counts, StorageConfig};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

/// What the inspector reports about one dataset.
#[derive(Debug, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    /// Stored records per field.
    pub records: IndexMap<String, usize>,
    pub fields: IndexMap<String, FieldInfo>,
    pub meta: Meta,
    /// Grid shape, when requested and the records can be put on a grid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_shape: Option<Vec<usize>>,
}

/// Summarize dataset `name` given its structure.
///
/// With `grid`, the records are read and the grid shape is guessed.
pub fn summarize(
    path: &Path,
    name: &str,
    structure: &DataDict,
    grid: bool,
    config: &StorageConfig,
) -> Result<DatasetSummary> {
    let records = record_counts(path, name, config)
        .with_context(|| format!("failed to count records of '{name}'"))?;

    let grid_shape = if grid {
        let data = datadict_from_ddz(path, name, None, None, false, config)
            .with_context(|| format!("failed to read '{name}'"))?;
        match datadict_to_meshgrid(&data, None, None) {
            Ok(grid) => grid.shape(),
            Err(e) => {
                warn!(dataset = %name, error = %e, "records do not form a grid");
                None
            }
        }
    } else {
        None
    };
    debug!(dataset = %name, ?grid_shape, "summarized");

    Ok(DatasetSummary {
        name: name.to_string(),
        records,
        fields: structure
            .iter()
            .map(|(field, f)| (field.clone(), FieldInfo::from(f)))
            .collect(),
        meta: structure.meta().clone(),
        grid_shape,
    })
}

/// Human readable rendering.
pub fn render_text(summary: &DatasetSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", summary.name);
    for (name, info) in &summary.fields {
        let records = summary.records.get(name).copied().unwrap_or(0);
        let unit = if info.unit.is_empty() {
            String::new()
        } else {
            format!(" [{}]", info.unit)
        };
        let axes = if info.axes.is_empty() {
            String::new()
        } else {
            format!(" ({})", info.axes.join(", "))
        };
        let inner = info.shape.get(1..).unwrap_or_default();
        let _ = writeln!(
            out,
            "  {name}{unit}{axes}: {records} records, {}, inner shape {inner:?}",
            info.dtype
        );
    }
    for (key, value) in &summary.meta {
        let _ = writeln!(out, "  @{key} = {value}");
    }
    if let Some(shape) = &summary.grid_shape {
        let _ = writeln!(out, "  grid shape {shape:?}");
    }
    out
}
