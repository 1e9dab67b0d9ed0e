//! A single named entry of a dataset: values, axes, unit and meta.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::values::Values;

/// Meta information value. Anything JSON can represent.
pub type MetaValue = serde_json::Value;

/// Ordered meta map attached to a dataset or a field.
pub type Meta = IndexMap<String, MetaValue>;

/// One field of a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    pub values: Values,
    /// Names of the fields this one depends on; empty for axes.
    pub axes: Vec<String>,
    pub unit: String,
    pub meta: Meta,
}

impl Field {
    pub fn new(values: impl Into<Values>) -> Self {
        Self {
            values: values.into(),
            ..Default::default()
        }
    }

    /// Set the dependency list.
    pub fn with_axes<S: AsRef<str>>(mut self, axes: &[S]) -> Self {
        self.axes = axes.iter().map(|a| a.as_ref().to_string()).collect();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Whether this field depends on other fields.
    pub fn is_dependent(&self) -> bool {
        !self.axes.is_empty()
    }

    /// Copy without values (an empty array with the same element type and inner shape).
    pub fn structure(&self, include_meta: bool) -> Self {
        Self {
            values: Values::empty(self.values.dtype(), self.values.inner_shape()),
            axes: self.axes.clone(),
            unit: self.unit.clone(),
            meta: if include_meta {
                self.meta.clone()
            } else {
                Meta::new()
            },
        }
    }

    /// Same axes and unit; values and meta are ignored.
    pub fn same_labels(&self, other: &Field) -> bool {
        self.axes == other.axes && self.unit == other.unit
    }
}

/// Serializable description of a field without its values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub axes: Vec<String>,
    pub unit: String,
    pub dtype: String,
    pub shape: Vec<usize>,
}

impl From<&Field> for FieldInfo {
    fn from(field: &Field) -> Self {
        Self {
            axes: field.axes.clone(),
            unit: field.unit.clone(),
            dtype: field.values.dtype().to_string(),
            shape: field.values.shape().to_vec(),
        }
    }
}
