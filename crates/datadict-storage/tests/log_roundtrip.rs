//! Integration tests: write datasets to a log and read them back.

use std::path::Path;

use datadict::{combine_datadicts, datasets_are_equal, DataDict, Field, Values};
use datadict_storage::{
    all_datadicts_from_ddz, datadict_from_ddz, datadict_to_ddz, list_datasets, read,
    record_counts, strip_stamps, AppendMode, StorageConfig, StorageError,
};
use num_complex::Complex64;
use serde_json::json;
use test_utils::{linspace, names, sweep_coordinates, TempLogDir};

/// 2-d sweep over x (slow) and y (fast) with a few extra field types.
fn sample_data() -> DataDict {
    let coords = sweep_coordinates(&[linspace(0.0, 1.0, 3), linspace(-1.0, 1.0, 4)]);
    let x = coords[0].clone();
    let y = coords[1].clone();
    let z: Vec<f64> = x.iter().zip(&y).map(|(a, b)| a * b).collect();
    let n = x.len();
    let phase: Vec<Complex64> = z.iter().map(|v| Complex64::new(*v, -v)).collect();
    let count: Vec<i64> = (0..n as i64).collect();
    let flag: Vec<bool> = (0..n).map(|i| i % 2 == 0).collect();

    let mut data = DataDict::from_fields([
        ("x", Field::new(x).with_unit("V")),
        ("y", Field::new(y).with_unit("V")),
        (
            "z",
            Field::new(z)
                .with_axes(&["x", "y"])
                .with_unit("A")
                .with_meta("gain", 100),
        ),
        ("phase", Field::new(phase).with_axes(&["x", "y"])),
        ("count", Field::new(count).with_axes(&["x", "y"])),
        ("flag", Field::new(flag).with_axes(&["x", "y"])),
    ]);
    data.add_meta("sample", "A1");
    data.add_meta("temperatures", json!([0.01, 4.2]));
    data
}

fn rows(n: usize, offset: f64) -> [(&'static str, Values); 2] {
    let x: Vec<f64> = (0..n).map(|i| i as f64 + offset).collect();
    let y: Vec<f64> = x.iter().map(|v| v * 2.0).collect();
    [("x", Values::from(x)), ("y", Values::from(y))]
}

fn xy(n: usize) -> DataDict {
    let mut data = DataDict::from_fields([
        ("x", Field::new(Vec::<f64>::new())),
        ("y", Field::new(Vec::<f64>::new()).with_axes(&["x"])),
    ]);
    data.add_data(rows(n, 0.0)).unwrap();
    data
}

/// Records stored for `field` of the default dataset.
fn stored_rows(path: &Path, field: &str) -> usize {
    record_counts(path, names::DATA, &StorageConfig::default()).unwrap()[field]
}

// =============================================================================
// Round trip
// =============================================================================

#[test]
fn test_round_trip_preserves_data_and_meta() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let data = sample_data();

    datadict_to_ddz(&data, &path, names::DATA, AppendMode::None, &StorageConfig::default())
        .unwrap();
    let back = read(&path, names::DATA, None, false).unwrap();

    assert!(datasets_are_equal(&data, &back, true));
    assert_eq!(back.field_names(), data.field_names());
    assert_eq!(back.field("z").unwrap().unit, "A");
    assert_eq!(back.field("phase").unwrap().values.dtype(), data.field("phase").unwrap().values.dtype());

    let mut stripped = back.clone();
    strip_stamps(&mut stripped);
    assert!(datasets_are_equal(&data, &stripped, false));
}

#[test]
fn test_groups_of_different_length_round_trip() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let first = DataDict::from_fields([
        ("x", Field::new(vec![0.0, 1.0])),
        ("a", Field::new(vec![10.0, 11.0]).with_axes(&["x"])),
    ]);
    let second = DataDict::from_fields([
        ("x", Field::new(vec![5.0, 6.0, 7.0])),
        ("b", Field::new(vec![20.0, 21.0, 22.0]).with_axes(&["x"])),
    ]);
    let data = combine_datadicts(&[first, second]).unwrap();
    assert!(data.validate().is_ok());
    assert_eq!(data.nrecords(), None);

    datadict_to_ddz(&data, &path, names::DATA, AppendMode::None, &StorageConfig::default())
        .unwrap();
    let mut back = read(&path, names::DATA, None, false).unwrap();
    strip_stamps(&mut back);

    assert_eq!(back.data_vals("x_0").unwrap().nrows(), 3);
    assert_eq!(back.data_vals("b").unwrap(), &Values::from(vec![20.0, 21.0, 22.0]));
    assert!(datasets_are_equal(&data, &back, false));

    let head = read(&path, names::DATA, Some(1..10), false).unwrap();
    assert_eq!(head.data_vals("a").unwrap(), &Values::from(vec![11.0]));
    assert_eq!(head.data_vals("b").unwrap(), &Values::from(vec![21.0, 22.0]));
}

#[test]
fn test_creation_time_is_added() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");

    datadict_to_ddz(&xy(2), &path, names::DATA, AppendMode::None, &StorageConfig::default())
        .unwrap();
    let back = read(&path, names::DATA, None, false).unwrap();

    assert!(back.meta_val("creation_time_seconds").is_some());
    assert!(back.meta_val("creation_time_string").is_some());
    assert!(back
        .field_meta_val("x", "creation_time_seconds")
        .unwrap()
        .is_some());
}

#[test]
fn test_missing_extension_is_added() {
    let dir = TempLogDir::new().unwrap();
    let bare = dir.path().join("run");

    datadict_to_ddz(&xy(2), &bare, names::DATA, AppendMode::None, &StorageConfig::default())
        .unwrap();

    assert!(dir.log_path("run").is_dir());
    assert_eq!(read(dir.log_path("run"), names::DATA, None, false).unwrap().nrecords(), Some(2));
}

#[test]
fn test_small_chunks() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let config = StorageConfig {
        chunk_records: 2,
        ..Default::default()
    };

    let mut data = xy(3);
    datadict_to_ddz(&data, &path, names::DATA, AppendMode::None, &config).unwrap();
    data.add_data(rows(4, 3.0)).unwrap();
    datadict_to_ddz(&data, &path, names::DATA, AppendMode::New, &config).unwrap();

    let back = datadict_from_ddz(&path, names::DATA, None, None, false, &config).unwrap();
    assert!(datasets_are_equal(&data, &back, true));
}

#[test]
fn test_nested_records_round_trip() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let trace = ndarray::Array2::from_shape_fn((3, 5), |(i, j)| (i * 10 + j) as f64);
    let data = DataDict::from_fields([
        ("repetition", Field::new(vec![0i64, 1, 2])),
        ("trace", Field::new(trace).with_axes(&["repetition"])),
    ]);

    datadict_to_ddz(&data, &path, names::DATA, AppendMode::None, &StorageConfig::default())
        .unwrap();
    let back = read(&path, names::DATA, None, false).unwrap();

    assert_eq!(back.field("trace").unwrap().values.shape(), &[3, 5]);
    assert!(datasets_are_equal(&data, &back, true));
}

// =============================================================================
// Append modes
// =============================================================================

#[test]
fn test_new_mode_appends_only_new_records() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let config = StorageConfig::default();

    let mut data = xy(3);
    datadict_to_ddz(&data, &path, names::DATA, AppendMode::None, &config).unwrap();
    data.add_data(rows(2, 3.0)).unwrap();
    datadict_to_ddz(&data, &path, names::DATA, AppendMode::New, &config).unwrap();

    assert_eq!(stored_rows(&path, "x"), 5);
    assert_eq!(stored_rows(&path, "y"), 5);

    // Nothing new: nothing written.
    datadict_to_ddz(&data, &path, names::DATA, AppendMode::New, &config).unwrap();
    assert_eq!(stored_rows(&path, "x"), 5);

    let back = read(&path, names::DATA, None, false).unwrap();
    assert!(datasets_are_equal(&data, &back, true));
}

#[test]
fn test_all_mode_appends_everything() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let config = StorageConfig::default();
    let data = xy(3);

    datadict_to_ddz(&data, &path, names::DATA, AppendMode::None, &config).unwrap();
    datadict_to_ddz(&data, &path, names::DATA, AppendMode::All, &config).unwrap();

    let back = read(&path, names::DATA, None, false).unwrap();
    assert_eq!(back.nrecords(), Some(6));
    assert_eq!(back.data_vals("x").unwrap(), &Values::from(vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]));
}

#[test]
fn test_none_mode_replaces_group() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let config = StorageConfig::default();

    datadict_to_ddz(&xy(5), &path, names::DATA, AppendMode::None, &config).unwrap();
    datadict_to_ddz(&xy(2), &path, names::DATA, AppendMode::None, &config).unwrap();

    assert_eq!(stored_rows(&path, "x"), 2);
}

#[test]
fn test_append_to_missing_group_creates_it() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");

    datadict_to_ddz(&xy(2), &path, names::DATA, AppendMode::New, &StorageConfig::default())
        .unwrap();

    assert_eq!(stored_rows(&path, "y"), 2);
}

#[test]
fn test_append_with_other_fields_is_rejected() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let config = StorageConfig::default();

    datadict_to_ddz(&xy(2), &path, names::DATA, AppendMode::None, &config).unwrap();
    let other = DataDict::from_fields([("x", Field::new(vec![1.0]))]);
    let err = datadict_to_ddz(&other, &path, names::DATA, AppendMode::New, &config).unwrap_err();

    assert!(matches!(err, StorageError::Incompatible(_)));
    assert_eq!(stored_rows(&path, "x"), 2);
}

#[test]
fn test_append_widens_to_stored_type() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let config = StorageConfig::default();

    datadict_to_ddz(&xy(2), &path, names::DATA, AppendMode::None, &config).unwrap();
    let ints = DataDict::from_fields([
        ("x", Field::new(vec![7i64])),
        ("y", Field::new(vec![8i64]).with_axes(&["x"])),
    ]);
    datadict_to_ddz(&ints, &path, names::DATA, AppendMode::All, &config).unwrap();

    let back = read(&path, names::DATA, None, false).unwrap();
    assert_eq!(back.data_vals("x").unwrap(), &Values::from(vec![0.0, 1.0, 7.0]));
}

#[test]
fn test_invalid_dataset_is_not_written() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let broken = DataDict::from_fields([("y", Field::new(vec![1.0]).with_axes(&["x"]))]);

    let err = datadict_to_ddz(&broken, &path, names::DATA, AppendMode::None, &StorageConfig::default())
        .unwrap_err();
    assert!(matches!(err, StorageError::Data(_)));
    assert!(!path.exists());
}

// =============================================================================
// Reading
// =============================================================================

#[test]
fn test_read_record_range() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    datadict_to_ddz(&xy(6), &path, names::DATA, AppendMode::None, &StorageConfig::default())
        .unwrap();

    let part = read(&path, names::DATA, Some(2..4), false).unwrap();
    assert_eq!(part.data_vals("x").unwrap(), &Values::from(vec![2.0, 3.0]));

    let clamped = read(&path, names::DATA, Some(4..100), false).unwrap();
    assert_eq!(clamped.nrecords(), Some(2));
}

#[test]
fn test_structure_only() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let data = sample_data();
    datadict_to_ddz(&data, &path, names::DATA, AppendMode::None, &StorageConfig::default())
        .unwrap();

    let structure = read(&path, names::DATA, None, true).unwrap();
    assert_eq!(structure.nrecords(), Some(0));
    assert!(structure.same_structure(&data));
    assert_eq!(structure.field_meta_val("z", "gain").unwrap(), Some(&json!(100)));
}

#[test]
fn test_several_datasets_in_one_log() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let config = StorageConfig::default();

    datadict_to_ddz(&xy(3), &path, names::DATA, AppendMode::None, &config).unwrap();
    datadict_to_ddz(&sample_data(), &path, names::CALIBRATION, AppendMode::None, &config)
        .unwrap();

    let all = all_datadicts_from_ddz(&path, false, &config).unwrap();
    let keys: Vec<&str> = all.keys().map(String::as_str).collect();
    assert_eq!(keys, vec![names::CALIBRATION, names::DATA]);
    assert_eq!(all[names::DATA].nrecords(), Some(3));

    let listed = list_datasets(&path).unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.values().all(|d| d.nrecords() == Some(0)));
}

#[test]
fn test_missing_log_and_dataset() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");

    assert!(matches!(
        read(&path, names::DATA, None, false),
        Err(StorageError::NotFound(_))
    ));

    datadict_to_ddz(&xy(1), &path, names::DATA, AppendMode::None, &StorageConfig::default())
        .unwrap();
    assert!(matches!(
        read(&path, names::CALIBRATION, None, false),
        Err(StorageError::NotFound(_))
    ));
}
