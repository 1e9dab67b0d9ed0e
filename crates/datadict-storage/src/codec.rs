//! Mapping between datasets and Zarr nodes.
//!
//! Dataset and field metadata keys are stored as `__key__` attributes so
//! they cannot collide with the structural attributes (`fields`, `axes`,
//! `unit`). Timestamps use the same convention and therefore show up in the
//! metadata of a dataset read back from disk.

use chrono::{DateTime, Local};
use datadict::{DType, DataDictBase, Field, Meta, Values};
use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use serde_json::{json, Map, Value};
use zarrs::array::{Array, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::error::{Result, StorageError};

/// Group attribute listing the fields of a dataset in order.
pub const FIELDS_ATTR: &str = "fields";
/// Array attribute listing the axes of a field.
pub const AXES_ATTR: &str = "axes";
/// Array attribute holding the unit of a field.
pub const UNIT_ATTR: &str = "unit";

/// Attribute name for a metadata key.
pub fn wrap_meta_key(key: &str) -> String {
    format!("__{key}__")
}

/// Metadata key for an attribute name, if the attribute holds metadata.
pub fn unwrap_meta_key(attr: &str) -> Option<&str> {
    attr.strip_prefix("__")
        .and_then(|s| s.strip_suffix("__"))
        .filter(|s| !s.is_empty())
}

/// Timestamps recorded on groups and arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// Set once, when the node is created.
    Creation,
    /// Updated by every write.
    LastChange,
    /// Set when a writer closes the log.
    Close,
}

impl Stamp {
    pub const ALL: [Stamp; 3] = [Stamp::Creation, Stamp::LastChange, Stamp::Close];

    fn prefix(&self) -> &'static str {
        match self {
            Self::Creation => "creation_time",
            Self::LastChange => "last_change_time",
            Self::Close => "close_time",
        }
    }

    /// Metadata key of the epoch seconds.
    pub fn seconds_key(&self) -> String {
        format!("{}_seconds", self.prefix())
    }

    /// Metadata key of the formatted time.
    pub fn string_key(&self) -> String {
        format!("{}_string", self.prefix())
    }

    /// Record the stamp in `attrs`. A creation stamp is never overwritten.
    pub fn apply(&self, attrs: &mut Map<String, Value>, now: DateTime<Local>, format: &str) {
        let seconds = wrap_meta_key(&self.seconds_key());
        if *self == Self::Creation && attrs.contains_key(&seconds) {
            return;
        }
        let secs = now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) * 1e-6;
        attrs.insert(seconds, json!(secs));
        attrs.insert(
            wrap_meta_key(&self.string_key()),
            json!(now.format(format).to_string()),
        );
    }
}

/// Whether a metadata key is one of the automatic timestamps.
pub fn is_stamp_key(key: &str) -> bool {
    Stamp::ALL
        .iter()
        .any(|s| key == s.seconds_key() || key == s.string_key())
}

/// Remove the automatic timestamps from a dataset and its fields.
pub fn strip_stamps(data: &mut DataDictBase) {
    let keys: Vec<String> = data
        .meta_items()
        .map(|(k, _)| k.clone())
        .filter(|k| is_stamp_key(k))
        .collect();
    for key in keys {
        data.delete_meta(&key);
    }
    for name in data.field_names() {
        if let Ok(field) = data.field_mut(&name) {
            field.meta.retain(|k, _| !is_stamp_key(k));
        }
    }
}

/// Store user metadata into `attrs`, skipping the automatic timestamps.
fn insert_meta(attrs: &mut Map<String, Value>, meta: &Meta) {
    for (key, value) in meta {
        if !is_stamp_key(key) {
            attrs.insert(wrap_meta_key(key), value.clone());
        }
    }
}

/// Metadata held in an attribute map.
pub fn meta_from_attributes(attrs: &Map<String, Value>) -> Meta {
    attrs
        .iter()
        .filter_map(|(k, v)| unwrap_meta_key(k).map(|key| (key.to_string(), v.clone())))
        .collect()
}

/// Group attributes for a dataset, merged over `existing`.
pub fn group_attributes(data: &DataDictBase, existing: &Map<String, Value>) -> Map<String, Value> {
    let mut attrs = existing.clone();
    attrs.insert(FIELDS_ATTR.to_string(), json!(data.field_names()));
    insert_meta(&mut attrs, data.meta());
    attrs
}

/// Stored field list of a dataset group.
pub fn fields_from_attributes(attrs: &Map<String, Value>) -> Result<Vec<String>> {
    let fields = attrs
        .get(FIELDS_ATTR)
        .and_then(Value::as_array)
        .ok_or_else(|| StorageError::invalid_metadata("group has no field list"))?;
    fields
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| StorageError::invalid_metadata("field names must be strings"))
        })
        .collect()
}

/// Array attributes for a field, merged over `existing`.
pub fn field_attributes(field: &Field, existing: &Map<String, Value>) -> Map<String, Value> {
    let mut attrs = existing.clone();
    attrs.insert(AXES_ATTR.to_string(), json!(field.axes));
    attrs.insert(UNIT_ATTR.to_string(), json!(field.unit));
    insert_meta(&mut attrs, &field.meta);
    attrs
}

/// Axes list stored on a field array.
pub fn axes_from_attributes(attrs: &Map<String, Value>) -> Result<Vec<String>> {
    match attrs.get(AXES_ATTR) {
        Some(value) => Ok(serde_json::from_value(value.clone())?),
        None => Ok(Vec::new()),
    }
}

/// Rebuild a field from its array attributes and values.
pub fn field_from_attributes(attrs: &Map<String, Value>, values: Values) -> Result<Field> {
    let axes = axes_from_attributes(attrs)?;
    let unit = attrs
        .get(UNIT_ATTR)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Field {
        values,
        axes,
        unit,
        meta: meta_from_attributes(attrs),
    })
}

/// Zarr data type of an element type.
pub fn data_type(dtype: DType) -> DataType {
    match dtype {
        DType::Bool => DataType::Bool,
        DType::Int64 => DataType::Int64,
        DType::Float64 => DataType::Float64,
        DType::Complex128 => DataType::Complex128,
    }
}

/// Element type of a stored Zarr data type.
pub fn dtype_of(data_type: &DataType) -> Result<DType> {
    match data_type {
        DataType::Bool => Ok(DType::Bool),
        DataType::Int64 => Ok(DType::Int64),
        DataType::Float64 => Ok(DType::Float64),
        DataType::Complex128 => Ok(DType::Complex128),
        other => Err(StorageError::invalid_metadata(format!(
            "unsupported data type {other:?}"
        ))),
    }
}

/// Fill value for unwritten elements: invalid where the type can say so.
pub fn fill_value(dtype: DType) -> FillValue {
    match dtype {
        DType::Bool => FillValue::from(false),
        DType::Int64 => FillValue::from(0i64),
        DType::Float64 => FillValue::from(f64::NAN),
        DType::Complex128 => {
            let mut bytes = f64::NAN.to_ne_bytes().to_vec();
            bytes.extend_from_slice(&f64::NAN.to_ne_bytes());
            FillValue::new(bytes)
        }
    }
}

/// Chunk shape for a field: `chunk_records` along the record dimension,
/// whole inner dimensions otherwise.
pub fn chunk_shape(inner_shape: &[usize], chunk_records: usize) -> Vec<u64> {
    std::iter::once(chunk_records.max(1) as u64)
        .chain(inner_shape.iter().map(|&d| d.max(1) as u64))
        .collect()
}

fn rows_subset(start: usize, rows: usize, inner_shape: &[usize]) -> Result<ArraySubset> {
    let mut origin = vec![start as u64];
    origin.extend(std::iter::repeat(0).take(inner_shape.len()));
    let mut shape = vec![rows as u64];
    shape.extend(inner_shape.iter().map(|&d| d as u64));
    ArraySubset::new_with_start_shape(origin, shape).map_err(|e| StorageError::zarr(e.to_string()))
}

/// Write `values` into `array` starting at record `start`.
///
/// The array shape must already cover the written rows.
pub fn store_rows(array: &Array<FilesystemStore>, start: usize, values: &Values) -> Result<()> {
    if values.size() == 0 {
        return Ok(());
    }
    let subset = rows_subset(start, values.nrows(), values.inner_shape())?;
    let stored = match values {
        Values::Float(a) => {
            array.store_array_subset_elements(&subset, &a.iter().copied().collect::<Vec<f64>>())
        }
        Values::Complex(a) => array
            .store_array_subset_elements(&subset, &a.iter().copied().collect::<Vec<Complex64>>()),
        Values::Int(a) => {
            array.store_array_subset_elements(&subset, &a.iter().copied().collect::<Vec<i64>>())
        }
        Values::Bool(a) => {
            array.store_array_subset_elements(&subset, &a.iter().copied().collect::<Vec<bool>>())
        }
    };
    stored.map_err(|e| StorageError::zarr(e.to_string()))
}

fn retrieve<T>(
    array: &Array<FilesystemStore>,
    subset: &ArraySubset,
    shape: &[usize],
) -> Result<ArrayD<T>>
where
    T: zarrs::array::ElementOwned,
{
    let data: Vec<T> = if shape.iter().product::<usize>() == 0 {
        Vec::new()
    } else {
        array
            .retrieve_array_subset_elements(subset)
            .map_err(|e| StorageError::zarr(e.to_string()))?
    };
    Ok(ArrayD::from_shape_vec(IxDyn(shape), data)?)
}

/// Read records `start..stop` of `array`.
pub fn retrieve_rows(array: &Array<FilesystemStore>, start: usize, stop: usize) -> Result<Values> {
    let dtype = dtype_of(array.data_type())?;
    let inner: Vec<usize> = array.shape().iter().skip(1).map(|&d| d as usize).collect();
    let rows = stop.saturating_sub(start);
    let subset = rows_subset(start, rows, &inner)?;
    let mut shape = vec![rows];
    shape.extend_from_slice(&inner);

    Ok(match dtype {
        DType::Float64 => Values::Float(retrieve(array, &subset, &shape)?),
        DType::Complex128 => Values::Complex(retrieve(array, &subset, &shape)?),
        DType::Int64 => Values::Int(retrieve(array, &subset, &shape)?),
        DType::Bool => Values::Bool(retrieve(array, &subset, &shape)?),
    })
}
