//! Grid datasets: every field is a full meshgrid-shaped array.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::base::DataDictBase;
use crate::error::{DataDictError, Result};
use crate::field::Field;
use crate::num::{crop_valid_indices, interpolate_vertices};
use crate::values::Values;

/// Dataset in grid layout.
///
/// The dimension order of every array follows the axes list shared by all
/// dependents: the axis at position `i` varies along dimension `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshgridDataDict(DataDictBase);

impl Deref for MeshgridDataDict {
    type Target = DataDictBase;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for MeshgridDataDict {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<DataDictBase> for MeshgridDataDict {
    fn from(base: DataDictBase) -> Self {
        Self(base)
    }
}

impl MeshgridDataDict {
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

    /// Shape of the grid (the shape of the first field).
    pub fn shape(&self) -> Option<Vec<usize>> {
        self.iter().next().map(|(_, f)| f.values.shape().to_vec())
    }

    pub fn validate(&self) -> Result<()> {
        let mut violations = self.0.base_violations();

        let mut reference: Option<(&String, &Vec<String>)> = None;
        for (name, field) in self.iter().filter(|(_, f)| f.is_dependent()) {
            match reference {
                None => reference = Some((name, &field.axes)),
                Some((src, axes)) if axes != &field.axes => violations.push(format!(
                    "all dependents must have the same axes, but '{name}' has {:?} and '{src}' has {:?}",
                    field.axes, axes
                )),
                Some(_) => {}
            }
            if field.values.ndim() != field.axes.len() {
                violations.push(format!(
                    "'{name}' has {} axes, but {} dimensions",
                    field.axes.len(),
                    field.values.ndim()
                ));
            }
        }

        let mut grid: Option<(&String, &[usize])> = None;
        for (name, field) in self.iter() {
            match grid {
                None => grid = Some((name, field.values.shape())),
                Some((src, shape)) if shape != field.values.shape() => violations.push(format!(
                    "shapes need to match, but '{name}' has {:?} and '{src}' has {:?}",
                    field.values.shape(),
                    shape
                )),
                Some(_) => {}
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(DataDictError::Structural(violations))
        }
    }

    pub fn structure(&self, include_meta: bool) -> MeshgridDataDict {
        Self(self.0.structure(include_meta))
    }

    pub fn extract(&self, names: &[&str], include_meta: bool) -> Result<MeshgridDataDict> {
        let ret = Self(self.0.extract_fields(names, include_meta)?);
        ret.validate()?;
        Ok(ret)
    }

    /// Copy without axes no dependent uses.
    pub fn sanitize(&self) -> Result<MeshgridDataDict> {
        let ret = Self(self.0.without_unused_axes());
        ret.validate()?;
        Ok(ret)
    }

    /// New grid with the axes reordered; every array is transposed to match.
    ///
    /// All dependents share one axes list, so the order applies to all of them.
    pub fn reorder_axes(&self, order: &[(&str, usize)]) -> Result<MeshgridDataDict> {
        let dependents = self.dependents();
        let Some(first) = dependents.first() else {
            return Ok(self.clone());
        };
        let (perm, axes) = self.new_order(first, order, false)?;

        let mut ret = self.clone();
        for name in dependents.iter().chain(axes.iter()) {
            let field = ret.field_mut(name)?;
            field.values = field.values.transpose(&perm)?;
        }
        for name in &dependents {
            ret.field_mut(name)?.axes = axes.clone();
        }
        ret.validate()?;
        Ok(ret)
    }

    /// Axis fields paired with the dimension along which each one varies.
    fn sweep_dims(&self) -> Vec<(String, usize)> {
        let Some(dep) = self.iter().find(|(_, f)| f.is_dependent()) else {
            return Vec::new();
        };
        dep.1
            .axes
            .iter()
            .enumerate()
            .map(|(dim, ax)| (ax.clone(), dim))
            .collect()
    }

    /// Fill invalid vertices of every float-valued axis array.
    pub fn interpolate_vertices(&self) -> Result<MeshgridDataDict> {
        let mut ret = self.clone();
        for (ax, dim) in self.sweep_dims() {
            let field = ret.field_mut(&ax)?;
            if let Some(arr) = field.values.as_float() {
                field.values = Values::Float(interpolate_vertices(arr, dim));
            }
        }
        Ok(ret)
    }

    /// Shrink every array to the largest block on which all axes are valid.
    pub fn crop_invalid(&self) -> Result<MeshgridDataDict> {
        let masks: Vec<_> = self
            .sweep_dims()
            .iter()
            .map(|(ax, _)| self.data_vals(ax).map(Values::invalid_mask))
            .collect::<Result<_>>()?;
        if masks.is_empty() {
            return Ok(self.clone());
        }

        let keep = crop_valid_indices(&masks);
        let mut ret = self.clone();
        for (name, field) in ret.iter_mut() {
            let mut values = field.values.clone();
            for (dim, idx) in keep.iter().enumerate() {
                values = values.select(dim, idx)?;
            }
            debug!(field = %name, shape = ?values.shape(), "cropped");
            field.values = values;
        }
        Ok(ret)
    }
}
