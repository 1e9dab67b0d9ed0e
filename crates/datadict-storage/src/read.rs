//! Reading datasets back from a log.
//!
//! Every call re-opens the store under the access lock, so a reader sees the
//! state of the last completed flush. Each dependency group (a dependent with
//! its axes, joined through shared axes) is cut to its shortest stored field,
//! which keeps the returned records consistent within the group.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use datadict::{DataDict, Values};
use indexmap::IndexMap;
use tracing::debug;
use zarrs::array::Array;
use zarrs::group::Group;
use zarrs_filesystem::FilesystemStore;

use crate::codec::{
    axes_from_attributes, dtype_of, field_from_attributes, fields_from_attributes,
    meta_from_attributes, retrieve_rows,
};
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::layout::{array_node, group_node, list_groups, node_exists, open_store, with_extension};
use crate::lock::AccessLock;

/// Read dataset `group` from the log at `path`.
///
/// `start` and `stop` select a record range and are clamped to the records
/// available in each dependency group. With `structure_only`, fields carry no records
/// but keep their type, inner shape, axes, unit and metadata.
pub fn datadict_from_ddz(
    path: impl AsRef<Path>,
    group: &str,
    start: Option<usize>,
    stop: Option<usize>,
    structure_only: bool,
    config: &StorageConfig,
) -> Result<DataDict> {
    let path = with_extension(path.as_ref());
    let store = open_store(&path)?;
    let _access = AccessLock::acquire(&path, config)?;
    read_group(&store, &path, group, start, stop, structure_only)
}

/// Read every dataset of the log at `path`, keyed by name.
pub fn all_datadicts_from_ddz(
    path: impl AsRef<Path>,
    structure_only: bool,
    config: &StorageConfig,
) -> Result<IndexMap<String, DataDict>> {
    let path = with_extension(path.as_ref());
    let store = open_store(&path)?;
    let _access = AccessLock::acquire(&path, config)?;

    let mut datasets = IndexMap::new();
    for group in list_groups(&store, &path)? {
        let data = read_group(&store, &path, &group, None, None, structure_only)?;
        datasets.insert(group, data);
    }
    Ok(datasets)
}

/// Read a record range of dataset `name` with the default configuration.
pub fn read(
    path: impl AsRef<Path>,
    name: &str,
    rows: Option<Range<usize>>,
    structure_only: bool,
) -> Result<DataDict> {
    let (start, stop) = match rows {
        Some(range) => (Some(range.start), Some(range.end)),
        None => (None, None),
    };
    datadict_from_ddz(path, name, start, stop, structure_only, &StorageConfig::default())
}

/// Structure of every dataset in the log at `path`.
pub fn list_datasets(path: impl AsRef<Path>) -> Result<IndexMap<String, DataDict>> {
    all_datadicts_from_ddz(path, true, &StorageConfig::default())
}

/// Stored record count of every field of dataset `group`.
pub fn record_counts(
    path: impl AsRef<Path>,
    group: &str,
    config: &StorageConfig,
) -> Result<IndexMap<String, usize>> {
    let path = with_extension(path.as_ref());
    let store = open_store(&path)?;
    let _access = AccessLock::acquire(&path, config)?;

    let (_, arrays) = open_group(&store, &path, group)?;
    Ok(arrays
        .into_iter()
        .map(|(name, array)| {
            let rows = array.shape().first().copied().unwrap_or(0) as usize;
            (name, rows)
        })
        .collect())
}

type GroupArrays = (Group<FilesystemStore>, Vec<(String, Array<FilesystemStore>)>);

fn open_group(store: &Arc<FilesystemStore>, root: &Path, group: &str) -> Result<GroupArrays> {
    let node = group_node(group);
    if !node_exists(root, &node) {
        return Err(StorageError::not_found(format!(
            "dataset '{group}' in {}",
            root.display()
        )));
    }
    let group_meta =
        Group::open(store.clone(), &node).map_err(|e| StorageError::zarr(e.to_string()))?;

    let mut arrays = Vec::new();
    for name in fields_from_attributes(group_meta.attributes())? {
        let array = Array::open(store.clone(), &array_node(group, &name))
            .map_err(|e| StorageError::zarr(e.to_string()))?;
        arrays.push((name, array));
    }
    Ok((group_meta, arrays))
}

fn read_group(
    store: &Arc<FilesystemStore>,
    root: &Path,
    group: &str,
    start: Option<usize>,
    stop: Option<usize>,
    structure_only: bool,
) -> Result<DataDict> {
    let (group_meta, arrays) = open_group(store, root, group)?;

    let mut fields = Vec::with_capacity(arrays.len());
    for (name, array) in &arrays {
        let axes = axes_from_attributes(array.attributes())?;
        let rows = array.shape().first().copied().unwrap_or(0) as usize;
        fields.push((name.as_str(), axes, rows));
    }
    let available = readable_rows(&fields);

    let mut data = DataDict::new();
    for ((name, array), &rows) in arrays.iter().zip(&available) {
        let values = if structure_only {
            let inner: Vec<usize> = array.shape().iter().skip(1).map(|&d| d as usize).collect();
            Values::empty(dtype_of(array.data_type())?, &inner)
        } else {
            let stop = stop.map_or(rows, |s| s.min(rows));
            let start = start.unwrap_or(0).min(stop);
            retrieve_rows(array, start, stop)?
        };
        data.insert(name.clone(), field_from_attributes(array.attributes(), values)?);
    }
    for (key, value) in meta_from_attributes(group_meta.attributes()) {
        data.add_meta(key, value);
    }

    debug!(
        path = %root.display(),
        group,
        ?start,
        ?stop,
        structure_only,
        "read dataset"
    );
    data.validate()?;
    Ok(data)
}

/// Rows readable from each field, given `(name, axes, stored rows)`.
///
/// Fields joined by a dependent-axis relation share the smallest row count of
/// their group. Fields in no group keep their own count.
fn readable_rows(fields: &[(&str, Vec<String>, usize)]) -> Vec<usize> {
    let index: HashMap<&str, usize> = fields
        .iter()
        .enumerate()
        .map(|(i, (name, _, _))| (*name, i))
        .collect();

    let mut parent: Vec<usize> = (0..fields.len()).collect();
    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    for (i, (_, axes, _)) in fields.iter().enumerate() {
        for ax in axes {
            if let Some(&j) = index.get(ax.as_str()) {
                let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                parent[a] = b;
            }
        }
    }

    let mut smallest: HashMap<usize, usize> = HashMap::new();
    for (i, (_, _, rows)) in fields.iter().enumerate() {
        let r = root(&mut parent, i);
        let entry = smallest.entry(r).or_insert(*rows);
        *entry = (*entry).min(*rows);
    }
    (0..fields.len())
        .map(|i| {
            let r = root(&mut parent, i);
            smallest.get(&r).copied().unwrap_or(0)
        })
        .collect()
}
