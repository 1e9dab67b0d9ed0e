//! End-to-end scenarios: records arrive from a sweep, get validated, put on a
//! grid and merged with other datasets.

use datadict::{
    combine_datadicts, datadict_to_meshgrid, datadict_to_meshgrid_with, meshgrid_to_datadict,
    str2dd, DataDict, DataDictError, Field, GridOptions, Values,
};
use test_utils::{assert_values_approx_eq, linspace, ramp, sweep_coordinates, with_nans};

/// Records of a complete x (slow) by y (fast) sweep with `z` measured at each point.
fn sweep(nx: usize, ny: usize) -> DataDict {
    let coords = sweep_coordinates(&[linspace(0.0, 1.0, nx), linspace(-1.0, 1.0, ny)]);
    let mut data = str2dd("x[V]; y[V]; z[A](x, y)").unwrap();
    data.add_data([
        ("x", Values::from(coords[0].clone())),
        ("y", Values::from(coords[1].clone())),
        ("z", Values::from(ramp(nx * ny, 0.5))),
    ])
    .unwrap();
    data
}

fn floats(values: &Values) -> Vec<f64> {
    values.to_f64().iter().copied().collect()
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_valid_and_missing_axis() {
    let ok = DataDict::from_fields([
        ("x", Field::new(vec![0.0, 1.0, 2.0])),
        ("y", Field::new(vec![1.0, 2.0, 3.0])),
        ("z", Field::new(vec![0.0, 0.0, 0.0]).with_axes(&["x", "y"])),
    ]);
    assert!(ok.validate().is_ok());

    let broken = DataDict::from_fields([
        ("x", Field::new(vec![0.0, 1.0, 2.0])),
        ("z", Field::new(vec![0.0, 0.0, 0.0]).with_axes(&["x", "w"])),
    ]);
    match broken.validate() {
        Err(DataDictError::Structural(violations)) => {
            assert!(violations.iter().any(|v| v.contains("'w'")));
        }
        other => panic!("expected a structural error, got {other:?}"),
    }
}

#[test]
fn test_records_grow_by_add_data() {
    let mut data = sweep(2, 3);
    assert_eq!(data.nrecords(), Some(6));

    data.add_data([
        ("x", Values::from(vec![2.0])),
        ("y", Values::from(vec![-1.0])),
        ("z", Values::from(vec![9.0])),
    ])
    .unwrap();
    assert_eq!(data.nrecords(), Some(7));
}

// =============================================================================
// Grid conversion
// =============================================================================

#[test]
fn test_complete_sweep_round_trip() {
    let data = sweep(3, 4);
    let grid = datadict_to_meshgrid(&data, None, None).unwrap();
    assert_eq!(grid.shape(), Some(vec![3, 4]));

    let flat = meshgrid_to_datadict(&grid).unwrap();
    for name in ["x", "y", "z"] {
        assert_values_approx_eq!(
            floats(flat.data_vals(name).unwrap()),
            floats(data.data_vals(name).unwrap()),
            1e-12
        );
    }
}

#[test]
fn test_reorder_axes_is_reversible() {
    let grid = datadict_to_meshgrid(&sweep(3, 4), None, None).unwrap();

    let swapped = grid.reorder_axes(&[("y", 0), ("x", 1)]).unwrap();
    assert_eq!(swapped.shape(), Some(vec![4, 3]));
    assert_eq!(swapped.axes(Some("z")).unwrap(), vec!["y", "x"]);

    let back = swapped.reorder_axes(&[("x", 0), ("y", 1)]).unwrap();
    assert_eq!(back, grid);
}

#[test]
fn test_interrupted_sweep_is_padded_and_cropped() {
    let full = sweep(3, 4);
    let mut partial = full.structure(true);
    partial
        .add_data(["x", "y", "z"].map(|n| (n, full.data_vals(n).unwrap().slice_rows(0, 10))))
        .unwrap();
    assert_eq!(partial.nrecords(), Some(10));

    let padded = datadict_to_meshgrid_with(&partial, &GridOptions::default().with_shape(&[3, 4]))
        .unwrap();
    let z = floats(padded.data_vals("z").unwrap());
    let expected = with_nans(&ramp(12, 0.5), &[10, 11]);
    assert_values_approx_eq!(z, expected, 1e-12);

    let options = GridOptions {
        crop: true,
        ..GridOptions::default().with_shape(&[3, 4])
    };
    let cropped = datadict_to_meshgrid_with(&partial, &options).unwrap();
    assert_eq!(cropped.shape(), Some(vec![2, 4]));
    assert_values_approx_eq!(floats(cropped.data_vals("z").unwrap()), ramp(8, 0.5), 1e-12);
}

#[test]
fn test_interrupted_sweep_axes_are_interpolated() {
    let full = sweep(3, 4);
    let mut partial = full.structure(true);
    partial
        .add_data(["x", "y", "z"].map(|n| (n, full.data_vals(n).unwrap().slice_rows(0, 10))))
        .unwrap();

    let options = GridOptions {
        interpolate_vertices: true,
        ..GridOptions::default().with_shape(&[3, 4])
    };
    let grid = datadict_to_meshgrid_with(&partial, &options).unwrap();
    assert_eq!(grid.shape(), Some(vec![3, 4]));
    assert!(grid.validate().is_ok());

    // The missing vertices of the last x row get their coordinates back.
    for name in ["x", "y"] {
        assert_values_approx_eq!(
            floats(grid.data_vals(name).unwrap()),
            floats(full.data_vals(name).unwrap()),
            1e-12
        );
    }
    let expected = with_nans(&ramp(12, 0.5), &[10, 11]);
    assert_values_approx_eq!(floats(grid.data_vals("z").unwrap()), expected, 1e-12);
}

#[test]
fn test_shape_too_small_is_rejected() {
    let err = datadict_to_meshgrid(&sweep(3, 4), Some(&[2, 4]), None).unwrap_err();
    assert!(matches!(err, DataDictError::Conversion(_)));
}

// =============================================================================
// Combining
// =============================================================================

#[test]
fn test_combine_shares_identical_axes() {
    let a = DataDict::from_fields([
        ("x", Field::new(vec![0.0, 1.0])),
        ("y", Field::new(vec![1.0, 2.0]).with_axes(&["x"])),
    ]);
    let b = DataDict::from_fields([
        ("x", Field::new(vec![0.0, 1.0])),
        ("w", Field::new(vec![5.0, 6.0]).with_axes(&["x"])),
    ]);

    let combined = combine_datadicts(&[a.clone(), b]).unwrap();
    assert_eq!(combined.field_names(), vec!["x", "y", "w"]);
    assert_eq!(combined.axes(Some("w")).unwrap(), vec!["x"]);
    assert!(combined.validate().is_ok());

    let c = DataDict::from_fields([
        ("x", Field::new(vec![10.0, 11.0])),
        ("y", Field::new(vec![7.0, 8.0]).with_axes(&["x"])),
    ]);
    let renamed = combine_datadicts(&[a, c]).unwrap();
    assert!(renamed.contains("x_0"));
    assert!(renamed.contains("y_0"));
    assert_eq!(renamed.axes(Some("y_0")).unwrap(), vec!["x_0"]);
    assert!(renamed.validate().is_ok());
}
