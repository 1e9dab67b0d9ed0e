//! Appending datasets to a log.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};
use datadict::{DType, DataDict, Values};
use serde_json::{Map, Value};
use tracing::{debug, info};
use zarrs::array::{Array, ArrayBuilder, ChunkGrid};
use zarrs::group::{Group, GroupBuilder};
use zarrs_filesystem::FilesystemStore;

use crate::codec::{
    chunk_shape, data_type, dtype_of, field_attributes, fields_from_attributes, fill_value,
    group_attributes, store_rows, Stamp,
};
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::layout::{
    array_node, check_node_name, create_parent, create_store, group_node, node_exists, open_store,
    remove_group, with_extension,
};
use crate::lock::{AccessLock, WriterLock};

/// How data is merged with what a log already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppendMode {
    /// Replace the dataset group with the given data.
    #[default]
    None,
    /// Append only the records beyond those already stored, per field.
    New,
    /// Append every record again.
    All,
}

/// Write `data` into dataset `group` of the log at `path`.
///
/// Holds the writer lock for the duration of the call, so it fails with
/// [`StorageError::Busy`] while a [`DdzWriter`](crate::DdzWriter) owns the log.
/// A missing log or group is created regardless of `mode`.
pub fn datadict_to_ddz(
    data: &DataDict,
    path: impl AsRef<Path>,
    group: &str,
    mode: AppendMode,
    config: &StorageConfig,
) -> Result<()> {
    let path = with_extension(path.as_ref());
    create_parent(&path)?;
    let _writer = WriterLock::acquire(&path)?;
    write_datadict(data, &path, group, mode, config)?;
    Ok(())
}

/// Write under the access lock only. The caller owns the writer lock.
///
/// Returns the number of records appended to the longest field.
pub(crate) fn write_datadict(
    data: &DataDict,
    path: &Path,
    group: &str,
    mode: AppendMode,
    config: &StorageConfig,
) -> Result<usize> {
    config.validate().map_err(StorageError::Config)?;
    data.validate()?;
    check_node_name(group)?;
    for name in data.field_names() {
        check_node_name(&name)?;
    }
    create_parent(path)?;

    let _access = AccessLock::acquire(path, config)?;
    let store = create_store(path)?;
    if !node_exists(path, "/") {
        create_group(&store, "/", Map::new())?;
    }

    let mode = if node_exists(path, &group_node(group)) {
        mode
    } else {
        AppendMode::None
    };
    let now = Local::now();

    let written = match mode {
        AppendMode::None => {
            let written = replace_group(&store, path, data, group, now, config)?;
            info!(path = %path.display(), group, records = written, "created dataset");
            written
        }
        AppendMode::New | AppendMode::All => {
            let written = append_group(&store, data, group, mode, now, config)?;
            debug!(path = %path.display(), group, ?mode, records = written, "appended records");
            written
        }
    };
    Ok(written)
}

/// Record `stamp` on dataset `group` of the log at `path`.
pub(crate) fn stamp_group(
    path: &Path,
    group: &str,
    stamp: Stamp,
    config: &StorageConfig,
) -> Result<()> {
    let _access = AccessLock::acquire(path, config)?;
    let store = open_store(path)?;
    let node = group_node(group);
    let existing = Group::open(store.clone(), &node).map_err(|e| StorageError::zarr(e.to_string()))?;
    let mut attrs = existing.attributes().clone();
    stamp.apply(&mut attrs, Local::now(), &config.time_format);
    create_group(&store, &node, attrs)
}

fn create_group(store: &Arc<FilesystemStore>, node: &str, attrs: Map<String, Value>) -> Result<()> {
    GroupBuilder::new()
        .attributes(attrs)
        .build(store.clone(), node)
        .map_err(|e| StorageError::zarr(e.to_string()))?
        .store_metadata()
        .map_err(|e| StorageError::zarr(e.to_string()))
}

fn build_array(
    store: &Arc<FilesystemStore>,
    node: &str,
    dtype: DType,
    rows: usize,
    inner_shape: &[usize],
    attrs: Map<String, Value>,
    config: &StorageConfig,
) -> Result<Array<FilesystemStore>> {
    let mut shape = vec![rows as u64];
    shape.extend(inner_shape.iter().map(|&d| d as u64));
    let chunk_grid: ChunkGrid = chunk_shape(inner_shape, config.chunk_records)
        .try_into()
        .map_err(|e| StorageError::zarr(format!("{e:?}")))?;

    ArrayBuilder::new(shape, data_type(dtype), chunk_grid, fill_value(dtype))
        .attributes(attrs)
        .build(store.clone(), node)
        .map_err(|e| StorageError::zarr(e.to_string()))
}

fn replace_group(
    store: &Arc<FilesystemStore>,
    path: &Path,
    data: &DataDict,
    group: &str,
    now: DateTime<Local>,
    config: &StorageConfig,
) -> Result<usize> {
    if node_exists(path, &group_node(group)) {
        remove_group(store, group)?;
    }

    let mut attrs = group_attributes(data, &Map::new());
    Stamp::Creation.apply(&mut attrs, now, &config.time_format);
    Stamp::LastChange.apply(&mut attrs, now, &config.time_format);
    create_group(store, &group_node(group), attrs)?;

    let mut written = 0;
    for (name, field) in data.iter() {
        let mut attrs = field_attributes(field, &Map::new());
        Stamp::Creation.apply(&mut attrs, now, &config.time_format);

        let values = &field.values;
        let array = build_array(
            store,
            &array_node(group, name),
            values.dtype(),
            values.nrows(),
            values.inner_shape(),
            attrs,
            config,
        )?;
        store_rows(&array, 0, values)?;
        array
            .store_metadata()
            .map_err(|e| StorageError::zarr(e.to_string()))?;
        written = written.max(values.nrows());
    }
    Ok(written)
}

/// What to append to one stored field.
struct FieldAppend {
    node: String,
    dtype: DType,
    stored_rows: usize,
    inner_shape: Vec<usize>,
    values: Values,
    attrs: Map<String, Value>,
}

fn append_group(
    store: &Arc<FilesystemStore>,
    data: &DataDict,
    group: &str,
    mode: AppendMode,
    now: DateTime<Local>,
    config: &StorageConfig,
) -> Result<usize> {
    let node = group_node(group);
    let existing =
        Group::open(store.clone(), &node).map_err(|e| StorageError::zarr(e.to_string()))?;
    let stored: BTreeSet<String> = fields_from_attributes(existing.attributes())?
        .into_iter()
        .collect();
    let given: BTreeSet<String> = data.field_names().into_iter().collect();
    if stored != given {
        return Err(StorageError::incompatible(format!(
            "dataset '{group}' stores fields {stored:?}, got {given:?}"
        )));
    }

    // Check every field before touching any of them.
    let mut plan = Vec::with_capacity(data.len());
    for (name, field) in data.iter() {
        let array_path = array_node(group, name);
        let array = Array::open(store.clone(), &array_path)
            .map_err(|e| StorageError::zarr(e.to_string()))?;
        let shape: Vec<usize> = array.shape().iter().map(|&d| d as usize).collect();
        let Some((&stored_rows, inner_shape)) = shape.split_first() else {
            return Err(StorageError::invalid_metadata(format!(
                "'{array_path}' has no record dimension"
            )));
        };
        if inner_shape != field.values.inner_shape() {
            return Err(StorageError::incompatible(format!(
                "'{name}' stores records of shape {inner_shape:?}, got {:?}",
                field.values.inner_shape()
            )));
        }

        let values = match mode {
            AppendMode::New => field.values.slice_rows(stored_rows, field.values.nrows()),
            _ => field.values.clone(),
        };
        let stored_dtype = dtype_of(array.data_type())?;
        let dtype = if stored_rows == 0 {
            stored_dtype.promote(values.dtype())
        } else {
            stored_dtype
        };
        let values = values
            .cast(dtype)
            .map_err(|e| StorageError::incompatible(format!("'{name}': {e}")))?;

        plan.push(FieldAppend {
            node: array_path,
            dtype,
            stored_rows,
            inner_shape: inner_shape.to_vec(),
            values,
            attrs: field_attributes(field, array.attributes()),
        });
    }

    let mut written = 0;
    for entry in plan {
        let rows = entry.values.nrows();
        let array = build_array(
            store,
            &entry.node,
            entry.dtype,
            entry.stored_rows + rows,
            &entry.inner_shape,
            entry.attrs,
            config,
        )?;
        store_rows(&array, entry.stored_rows, &entry.values)?;
        array
            .store_metadata()
            .map_err(|e| StorageError::zarr(e.to_string()))?;
        written = written.max(rows);
    }

    let mut attrs = group_attributes(data, existing.attributes());
    Stamp::LastChange.apply(&mut attrs, now, &config.time_format);
    create_group(store, &node, attrs)?;

    Ok(written)
}
