//! Tabular datasets: one entry per record along the first array dimension.

use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use ndarray::Axis;
use tracing::debug;

use crate::base::DataDictBase;
use crate::error::{DataDictError, Result};
use crate::field::Field;
use crate::values::Values;

/// Dataset in record layout.
///
/// Every field holds at least a 1-D array whose first dimension counts
/// records. A dependent and its axes always hold the same number of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataDict(DataDictBase);

impl Deref for DataDict {
    type Target = DataDictBase;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DataDict {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<DataDictBase> for DataDict {
    fn from(base: DataDictBase) -> Self {
        Self(base)
    }
}

impl DataDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Field)>,
        S: Into<String>,
    {
        Self(DataDictBase::from_fields(fields))
    }

    /// Builder-style insert.
    pub fn with_field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.0.insert(name, field);
        self
    }

    pub fn as_base(&self) -> &DataDictBase {
        &self.0
    }

    pub fn into_base(self) -> DataDictBase {
        self.0
    }

    /// Check all structural invariants, reporting every violation at once.
    pub fn validate(&self) -> Result<()> {
        let mut violations = self.0.base_violations();

        for (name, field) in self.iter() {
            if field.values.ndim() == 0 {
                violations.push(format!("'{name}' is not an array of records (0-d values)"));
            }
        }

        for (name, field) in self.iter().filter(|(_, f)| f.is_dependent()) {
            let nrows = field.values.nrows();
            for ax in &field.axes {
                if let Ok(axis) = self.field(ax) {
                    if axis.values.nrows() != nrows {
                        violations.push(format!(
                            "'{name}' has {nrows} records, but its axis '{ax}' has {}",
                            axis.values.nrows()
                        ));
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(DataDictError::Structural(violations))
        }
    }

    /// Common record count of all fields, if they agree.
    pub fn nrecords(&self) -> Option<usize> {
        let mut counts = self.iter().map(|(_, f)| f.values.nrows());
        match counts.next() {
            Some(first) => counts.all(|n| n == first).then_some(first),
            None => Some(0),
        }
    }

    /// Append records given per field. Every field of the dataset must be
    /// supplied, with the same number of new records.
    pub fn add_data<I, S, V>(&mut self, data: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Values>,
    {
        let mut new: IndexMap<String, Values> = IndexMap::new();
        for (name, values) in data {
            let name = name.into();
            if !self.contains(&name) {
                return Err(DataDictError::FieldNotFound(name));
            }
            let values: Values = values.into();
            let values = if values.ndim() == 0 {
                values.reshape(&[1])?
            } else {
                values
            };
            new.insert(name, values);
        }

        let missing: Vec<String> = self
            .field_names()
            .into_iter()
            .filter(|n| !new.contains_key(n))
            .collect();
        if !missing.is_empty() {
            return Err(DataDictError::incompatible(format!(
                "data for all fields is required, missing: {}",
                missing.join(", ")
            )));
        }

        let mut rows = new.values().map(Values::nrows);
        if let Some(first) = rows.next() {
            if rows.any(|n| n != first) {
                return Err(DataDictError::incompatible(
                    "new data must have the same number of records for every field",
                ));
            }
        }

        let mut merged = Vec::with_capacity(new.len());
        for (name, values) in &new {
            merged.push((name.clone(), self.field(name)?.values.concat_rows(values)?));
        }
        let mut previous = Vec::with_capacity(merged.len());
        for (name, values) in merged {
            let old = std::mem::replace(&mut self.field_mut(&name)?.values, values);
            previous.push((name, old));
        }
        if let Err(e) = self.validate() {
            for (name, old) in previous {
                self.field_mut(&name)?.values = old;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Append all records of `other`, which must have the same structure.
    pub fn append(&mut self, other: &DataDict) -> Result<()> {
        if !self.same_structure(other) {
            return Err(DataDictError::incompatible(
                "cannot append a dataset with a different structure",
            ));
        }
        let mut merged = Vec::with_capacity(self.len());
        for (name, field) in self.iter() {
            merged.push((name.clone(), field.values.concat_rows(&other.field(name)?.values)?));
        }
        for (name, values) in merged {
            self.field_mut(&name)?.values = values;
        }
        Ok(())
    }

    /// New dataset holding the records of `self` followed by those of `other`.
    pub fn concat(&self, other: &DataDict) -> Result<DataDict> {
        let mut ret = self.clone();
        ret.append(other)?;
        Ok(ret)
    }

    pub fn structure(&self, include_meta: bool) -> DataDict {
        Self(self.0.structure(include_meta))
    }

    /// The requested fields and the axes they depend on.
    pub fn extract(&self, names: &[&str], include_meta: bool) -> Result<DataDict> {
        let ret = Self(self.0.extract_fields(names, include_meta)?);
        ret.validate()?;
        Ok(ret)
    }

    /// Drop unused axes and records that are invalid in every dependent.
    pub fn sanitize(&self) -> Result<DataDict> {
        Self(self.0.without_unused_axes()).remove_invalid_entries()
    }

    /// Drop records whose values are invalid in all dependents.
    pub fn remove_invalid_entries(&self) -> Result<DataDict> {
        let dependents = self.dependents();
        if dependents.is_empty() {
            return Ok(self.clone());
        }
        let Some(nrows) = self.nrecords() else {
            debug!("record counts differ between fields, keeping invalid entries");
            return Ok(self.clone());
        };

        let mut all_invalid = vec![true; nrows];
        for dep in &dependents {
            let mask = self.data_vals(dep)?.invalid_mask();
            for (row, flag) in all_invalid.iter_mut().enumerate() {
                *flag = *flag && mask.index_axis(Axis(0), row).iter().all(|&m| m);
            }
        }
        let keep: Vec<usize> = (0..nrows).filter(|&i| !all_invalid[i]).collect();
        if keep.len() == nrows {
            return Ok(self.clone());
        }
        debug!(removed = nrows - keep.len(), "removing invalid records");

        let mut ret = self.clone();
        for (_, field) in ret.iter_mut() {
            field.values = field.values.select(0, &keep)?;
        }
        Ok(ret)
    }

    /// New dataset with the axes of one (or every) dependent reordered.
    ///
    /// Only the axes lists change; record data stays as is.
    pub fn reorder_axes(&self, field: Option<&str>, order: &[(&str, usize)]) -> Result<DataDict> {
        let targets = match field {
            Some(name) => vec![name.to_string()],
            None => self.dependents(),
        };
        let mut ret = self.clone();
        for name in &targets {
            let (_, axes) = self.new_order(name, order, field.is_some())?;
            ret.field_mut(name)?.axes = axes;
        }
        ret.validate()?;
        Ok(ret)
    }

    /// Whether every field holds plain 1-D records.
    pub fn is_expanded(&self) -> bool {
        self.iter().all(|(_, f)| f.values.ndim() == 1)
    }

    /// Whether nested per-record arrays can be flattened into plain records.
    pub fn is_expandable(&self) -> bool {
        self.expansion_plan().is_some()
    }

    /// Repetitions per field needed to flatten nested records.
    ///
    /// Within a dependency group all non-scalar inner shapes must agree;
    /// scalar fields are repeated to match. A field shared by groups that
    /// need different repetitions cannot be expanded.
    fn expansion_plan(&self) -> Option<IndexMap<String, usize>> {
        let record_size = |f: &Field| f.values.inner_shape().iter().product::<usize>();
        let mut plan: IndexMap<String, usize> = IndexMap::new();

        for dep in self.dependents() {
            let field = self.field(&dep).ok()?;
            let mut group = vec![dep.clone()];
            group.extend(field.axes.iter().cloned());

            let mut inner: Option<&[usize]> = None;
            for name in &group {
                let f = self.field(name).ok()?;
                if record_size(f) > 1 {
                    match inner {
                        Some(shape) if shape != f.values.inner_shape() => return None,
                        _ => inner = Some(f.values.inner_shape()),
                    }
                }
            }
            let target: usize = inner.map(|s| s.iter().product()).unwrap_or(1);

            for name in &group {
                let size = record_size(self.field(name).ok()?).max(1);
                let reps = target / size;
                match plan.get(name) {
                    Some(&existing) if existing != reps => return None,
                    _ => {
                        plan.insert(name.clone(), reps);
                    }
                }
            }
        }

        for (name, _) in self.iter() {
            plan.entry(name.clone()).or_insert(1);
        }
        Some(plan)
    }

    /// Flatten nested per-record arrays, repeating scalar siblings to match.
    pub fn expand(&self) -> Result<DataDict> {
        self.validate()?;
        if self.is_expanded() {
            return Ok(self.clone());
        }
        let plan = self
            .expansion_plan()
            .ok_or_else(|| DataDictError::Shape("dataset cannot be expanded".to_string()))?;

        let mut ret = self.clone();
        for (name, field) in ret.iter_mut() {
            let reps = plan.get(name).copied().unwrap_or(1);
            field.values = field.values.flatten().repeat_each(reps);
        }
        ret.validate()?;
        Ok(ret)
    }
}
