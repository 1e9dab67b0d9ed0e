//! Functionality shared by tabular and grid datasets.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{DataDictError, Result};
use crate::field::{Field, Meta, MetaValue};
use crate::values::Values;

/// Ordered collection of fields plus dataset-level meta.
///
/// Insertion order of the fields is meaningful: it is the default axis order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataDictBase {
    fields: IndexMap<String, Field>,
    meta: Meta,
}

impl DataDictBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Field)>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(n, f)| (n.into(), f)).collect(),
            meta: Meta::new(),
        }
    }

    // Field access

    pub fn fields(&self) -> &IndexMap<String, Field> {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Result<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| DataDictError::FieldNotFound(name.to_string()))
    }

    pub fn field_mut(&mut self, name: &str) -> Result<&mut Field> {
        self.fields
            .get_mut(name)
            .ok_or_else(|| DataDictError::FieldNotFound(name.to_string()))
    }

    /// Values of field `name`.
    pub fn data_vals(&self, name: &str) -> Result<&Values> {
        Ok(&self.field(name)?.values)
    }

    /// Insert or replace a field. A replaced field keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, field: Field) -> Option<Field> {
        self.fields.insert(name.into(), field)
    }

    /// Remove a field, preserving the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.shift_remove(name)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Field> {
        self.fields.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, String, Field> {
        self.fields.iter_mut()
    }

    // Meta

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn add_meta(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn meta_val(&self, key: &str) -> Option<&MetaValue> {
        self.meta.get(key)
    }

    pub fn delete_meta(&mut self, key: &str) -> Option<MetaValue> {
        self.meta.shift_remove(key)
    }

    pub fn meta_items(&self) -> impl Iterator<Item = (&String, &MetaValue)> {
        self.meta.iter()
    }

    pub fn add_field_meta(
        &mut self,
        field: &str,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Result<()> {
        self.field_mut(field)?.meta.insert(key.into(), value.into());
        Ok(())
    }

    pub fn field_meta_val(&self, field: &str, key: &str) -> Result<Option<&MetaValue>> {
        Ok(self.field(field)?.meta.get(key))
    }

    pub fn delete_field_meta(&mut self, field: &str, key: &str) -> Result<Option<MetaValue>> {
        Ok(self.field_mut(field)?.meta.shift_remove(key))
    }

    pub fn field_meta_items(
        &self,
        field: &str,
    ) -> Result<impl Iterator<Item = (&String, &MetaValue)>> {
        Ok(self.field(field)?.meta.iter())
    }

    /// Remove meta of one field, or of the dataset and every field.
    pub fn clear_meta(&mut self, field: Option<&str>) -> Result<()> {
        match field {
            Some(name) => self.field_mut(name)?.meta.clear(),
            None => {
                self.meta.clear();
                for (_, f) in self.fields.iter_mut() {
                    f.meta.clear();
                }
            }
        }
        Ok(())
    }

    // Structure

    /// Axes of one field, or all independent axes used by any dependent.
    pub fn axes(&self, field: Option<&str>) -> Result<Vec<String>> {
        if let Some(name) = field {
            return Ok(self.field(name)?.axes.clone());
        }
        let mut axes: Vec<String> = Vec::new();
        for f in self.fields.values() {
            for ax in &f.axes {
                let independent = self.fields.get(ax).is_some_and(|a| a.axes.is_empty());
                if independent && !axes.contains(ax) {
                    axes.push(ax.clone());
                }
            }
        }
        Ok(axes)
    }

    /// Names of all fields that depend on axes.
    pub fn dependents(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, f)| f.is_dependent())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Whether all dependents share one axes list.
    pub fn compatible_axes(&self) -> bool {
        let mut lists = self.fields.values().filter(|f| f.is_dependent()).map(|f| &f.axes);
        match lists.next() {
            Some(first) => lists.all(|axes| axes == first),
            None => true,
        }
    }

    /// Copy with all values stripped.
    pub fn structure(&self, include_meta: bool) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .map(|(n, f)| (n.clone(), f.structure(include_meta)))
                .collect(),
            meta: if include_meta {
                self.meta.clone()
            } else {
                Meta::new()
            },
        }
    }

    /// Same field names, axes and units; values, order and meta are ignored.
    pub fn same_structure(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.iter().all(|(name, f)| {
                other.fields.get(name).is_some_and(|o| f.same_labels(o))
            })
    }

    /// Array shape of every field.
    pub fn shapes(&self) -> IndexMap<String, Vec<usize>> {
        self.fields
            .iter()
            .map(|(n, f)| (n.clone(), f.values.shape().to_vec()))
            .collect()
    }

    /// Display label `name (unit)`, or just `name` without a unit.
    pub fn label(&self, name: &str) -> Result<String> {
        let field = self.field(name)?;
        if field.unit.is_empty() {
            Ok(name.to_string())
        } else {
            Ok(format!("{name} ({})", field.unit))
        }
    }

    /// Structural checks common to both variants; returns all violations.
    pub(crate) fn base_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for (name, field) in &self.fields {
            let mut seen = HashSet::new();
            for ax in &field.axes {
                if !seen.insert(ax.as_str()) {
                    violations.push(format!("'{name}' lists axis '{ax}' more than once"));
                }
                if !self.fields.contains_key(ax) {
                    violations.push(format!("'{name}' has axis '{ax}', but no field '{ax}' is present"));
                }
            }
            if self.is_own_axis(name) {
                violations.push(format!("'{name}' is its own (transitive) axis"));
            }
        }
        violations
    }

    /// Whether following axes from `name` leads back to `name`.
    fn is_own_axis(&self, name: &str) -> bool {
        let mut stack: Vec<&str> = self
            .fields
            .get(name)
            .map(|f| f.axes.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == name {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(f) = self.fields.get(current) {
                stack.extend(f.axes.iter().map(String::as_str));
            }
        }
        false
    }

    /// Fields `names` plus every axis they depend on, in the order requested.
    pub(crate) fn extract_fields(&self, names: &[&str], include_meta: bool) -> Result<Self> {
        let mut wanted: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let mut i = 0;
        while i < wanted.len() {
            let field = self.field(&wanted[i])?;
            for ax in &field.axes {
                if !wanted.contains(ax) {
                    wanted.push(ax.clone());
                }
            }
            i += 1;
        }

        let mut ret = Self::new();
        for name in &wanted {
            ret.fields.insert(name.clone(), self.field(name)?.clone());
        }
        if include_meta {
            ret.meta = self.meta.clone();
        }
        Ok(ret)
    }

    /// Copy without axis fields that no dependent uses.
    pub(crate) fn without_unused_axes(&self) -> Self {
        let used: HashSet<&str> = self
            .fields
            .values()
            .flat_map(|f| f.axes.iter().map(String::as_str))
            .collect();
        let names: Vec<&String> = self.fields.keys().collect();
        let mut ret = Self {
            fields: IndexMap::new(),
            meta: self.meta.clone(),
        };
        for name in names {
            let field = &self.fields[name];
            if field.is_dependent() || used.contains(name.as_str()) {
                ret.fields.insert(name.clone(), field.clone());
            } else {
                debug!(field = %name, "dropping unused axis");
            }
        }
        ret
    }

    /// Permutation and new axes list for field `name`.
    ///
    /// `order` maps axis names to their new position. Unspecified axes keep
    /// their relative order and fill the remaining positions. Names not among
    /// the axes of `name` are skipped when `strict` is false.
    pub fn new_order(
        &self,
        name: &str,
        order: &[(&str, usize)],
        strict: bool,
    ) -> Result<(Vec<usize>, Vec<String>)> {
        let axes = &self.field(name)?.axes;
        let mut slots: Vec<Option<usize>> = vec![None; axes.len()];
        let mut used = HashSet::new();

        for &(ax, new_idx) in order {
            if !used.insert(new_idx) {
                return Err(DataDictError::invalid_argument(
                    "order indices have to be unique",
                ));
            }
            let Some(old_idx) = axes.iter().position(|a| a == ax) else {
                if strict {
                    return Err(DataDictError::invalid_argument(format!(
                        "'{ax}' is not an axis of '{name}'"
                    )));
                }
                continue;
            };
            if new_idx >= axes.len() {
                return Err(DataDictError::invalid_argument(format!(
                    "position {new_idx} out of range for the {} axes of '{name}'",
                    axes.len()
                )));
            }
            slots[new_idx] = Some(old_idx);
        }

        let mut remaining = (0..axes.len()).filter(|i| !slots.contains(&Some(*i)));
        let perm: Vec<usize> = slots
            .iter()
            .map(|slot| slot.or_else(|| remaining.next()).unwrap_or_default())
            .collect();
        let new_axes = perm.iter().map(|&i| axes[i].clone()).collect();
        Ok((perm, new_axes))
    }

    /// Equality of all fields (values via the invalid-aware comparator) and,
    /// unless `ignore_meta`, of all meta.
    pub fn equals(&self, other: &Self, ignore_meta: bool) -> bool {
        if ignore_meta {
            self.fields.len() == other.fields.len()
                && self.fields.iter().all(|(name, f)| {
                    other
                        .fields
                        .get(name)
                        .is_some_and(|o| f.same_labels(o) && f.values == o.values)
                })
        } else {
            self == other
        }
    }
}

/// Equality of two datasets, optionally ignoring all meta.
pub fn datasets_are_equal(a: &DataDictBase, b: &DataDictBase, ignore_meta: bool) -> bool {
    a.equals(b, ignore_meta)
}
