//! Conversion between tabular and grid layouts.

use tracing::{debug, info};

use crate::datadict::DataDict;
use crate::error::{DataDictError, Result};
use crate::meshgrid::MeshgridDataDict;
use crate::num::{array1d_to_meshgrid, guess_grid_from_sweep_direction};

/// Options for [`datadict_to_meshgrid_with`].
#[derive(Debug, Clone, Default)]
pub struct GridOptions {
    /// Grid shape, given in the order of `inner_axis_order`. Guessed when absent.
    pub target_shape: Option<Vec<usize>>,
    /// Order (slow to fast) in which the records were swept. Defaults to
    /// the axes order of the dependents. Only used with a target shape.
    pub inner_axis_order: Option<Vec<String>>,
    /// Fill invalid axis vertices by interpolation.
    pub interpolate_vertices: bool,
    /// Crop to the largest block with valid axis vertices.
    pub crop: bool,
}

impl GridOptions {
    pub fn with_shape(mut self, shape: &[usize]) -> Self {
        self.target_shape = Some(shape.to_vec());
        self
    }

    pub fn with_order<S: AsRef<str>>(mut self, order: &[S]) -> Self {
        self.inner_axis_order = Some(order.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }
}

/// Put tabular data on a grid.
///
/// Without `target_shape` the shape and sweep order are guessed from the axes
/// values. Incomplete grids are padded with invalid entries.
pub fn datadict_to_meshgrid(
    data: &DataDict,
    target_shape: Option<&[usize]>,
    inner_axis_order: Option<&[&str]>,
) -> Result<MeshgridDataDict> {
    let options = GridOptions {
        target_shape: target_shape.map(<[usize]>::to_vec),
        inner_axis_order: inner_axis_order.map(|o| o.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    };
    datadict_to_meshgrid_with(data, &options)
}

pub fn datadict_to_meshgrid_with(data: &DataDict, options: &GridOptions) -> Result<MeshgridDataDict> {
    if data.is_empty() {
        return Ok(MeshgridDataDict::new());
    }
    if !data.compatible_axes() {
        return Err(DataDictError::conversion(
            "dependents have different axes, cannot put them on one grid",
        ));
    }
    data.validate()?;

    let expanded;
    let data = if data.is_expanded() {
        data
    } else if data.is_expandable() {
        expanded = data.expand()?;
        &expanded
    } else {
        return Err(DataDictError::conversion(
            "nested records cannot be expanded into plain records",
        ));
    };

    let dependents = data.dependents();
    let Some(first) = dependents.first() else {
        return Err(DataDictError::conversion("no dependent fields to put on a grid"));
    };
    let axes = data.axes(Some(first))?;
    let nrecords = data
        .nrecords()
        .ok_or_else(|| DataDictError::conversion("fields hold different numbers of records"))?;

    let (order, shape) = match &options.target_shape {
        Some(shape) => {
            let order = options.inner_axis_order.clone().unwrap_or_else(|| axes.clone());
            check_order(&order, &axes)?;
            if shape.len() != order.len() {
                return Err(DataDictError::conversion(format!(
                    "target shape {shape:?} does not match the {} axes",
                    order.len()
                )));
            }
            let size: usize = shape.iter().product();
            if size < nrecords {
                return Err(DataDictError::conversion(format!(
                    "target shape {shape:?} holds {size} points, but there are {nrecords} records"
                )));
            }
            (order, shape.clone())
        }
        None if nrecords == 0 => (axes.clone(), vec![0; axes.len()]),
        None => {
            let columns: Vec<(String, Vec<f64>)> = axes
                .iter()
                .map(|ax| Ok((ax.clone(), data.data_vals(ax)?.to_f64().iter().copied().collect())))
                .collect::<Result<_>>()?;
            let borrowed: Vec<(&str, &[f64])> = columns
                .iter()
                .map(|(n, v)| (n.as_str(), v.as_slice()))
                .collect();
            guess_grid_from_sweep_direction(&borrowed)?.ok_or_else(|| {
                DataDictError::conversion(
                    "could not determine the grid shape, an explicit target shape is required",
                )
            })?
        }
    };
    debug!(?order, ?shape, "gridding");

    // Dimension i of the result belongs to axes[i].
    let perm: Vec<usize> = axes
        .iter()
        .map(|ax| order.iter().position(|o| o == ax).unwrap_or_default())
        .collect();

    let mut grid = MeshgridDataDict::from(data.structure(true).into_base());
    for (name, field) in data.iter() {
        let values = array1d_to_meshgrid(&field.values, &shape)?.transpose(&perm)?;
        grid.field_mut(name)?.values = values;
    }

    if options.interpolate_vertices {
        grid = grid.interpolate_vertices()?;
    }
    if options.crop {
        grid = grid.crop_invalid()?;
    }
    grid.validate()?;
    info!(shape = ?grid.shape(), "converted records to grid");
    Ok(grid)
}

fn check_order(order: &[String], axes: &[String]) -> Result<()> {
    let mut sorted_order = order.to_vec();
    let mut sorted_axes = axes.to_vec();
    sorted_order.sort();
    sorted_axes.sort();
    if sorted_order != sorted_axes {
        return Err(DataDictError::conversion(format!(
            "axis order {order:?} does not match the axes {axes:?}"
        )));
    }
    Ok(())
}

/// Flatten every field of a grid in row-major order.
pub fn meshgrid_to_datadict(data: &MeshgridDataDict) -> Result<DataDict> {
    data.validate()?;
    let mut ret = DataDict::from(data.structure(true).into_base());
    for (name, field) in data.iter() {
        ret.field_mut(name)?.values = field.values.flatten();
    }
    ret.validate()?;
    Ok(ret)
}
