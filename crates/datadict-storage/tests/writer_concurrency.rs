//! Integration tests for the incremental writer and concurrent readers.

use std::path::Path;
use std::thread;
use std::time::Duration;

use datadict::{str2dd, Values};
use datadict_storage::{
    datadict_from_ddz, datadict_to_ddz, read, record_counts, AccessLock, AppendMode, DdzWriter,
    StorageConfig, StorageError, WriterOptions, DATASET_NAME_META,
};
use test_utils::{names, TempLogDir};

fn one(v: f64) -> Values {
    Values::from(vec![v])
}

/// Records stored for `field` of the default dataset.
fn stored_rows(path: &Path, field: &str) -> usize {
    record_counts(path, names::DATA, &StorageConfig::default()).unwrap()[field]
}

// =============================================================================
// Buffering
// =============================================================================

#[test]
fn test_incomplete_records_are_buffered() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let mut writer =
        DdzWriter::open(str2dd("x; y; z(x, y)").unwrap(), &path, names::DATA).unwrap();

    writer.add_data([("x", one(1.0))]).unwrap();
    writer.add_data([("y", one(2.0))]).unwrap();
    assert_eq!(writer.pending_records()["x"], 1);
    assert_eq!(stored_rows(&path, "x"), 0);

    writer.add_data([("z", one(3.0))]).unwrap();
    assert!(writer.pending_records().is_empty());
    assert_eq!(writer.datadict().nrecords(), Some(1));
    assert_eq!(stored_rows(&path, "z"), 1);
}

#[test]
fn test_partial_batches_complete_across_calls() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let mut writer = DdzWriter::open(str2dd("x; y(x)").unwrap(), &path, names::DATA).unwrap();

    writer
        .add_data([("x", Values::from(vec![0.0, 1.0, 2.0]))])
        .unwrap();
    writer.add_data([("y", Values::from(vec![10.0, 11.0]))]).unwrap();

    assert_eq!(writer.pending_records()["x"], 1);
    assert_eq!(writer.datadict().nrecords(), Some(2));
    assert_eq!(stored_rows(&path, "y"), 2);
}

#[test]
fn test_scalars_are_single_records() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let mut writer = DdzWriter::open(str2dd("x; y(x)").unwrap(), &path, names::DATA).unwrap();

    for i in 0..4 {
        let x = ndarray::arr0(i as f64).into_dyn();
        let y = ndarray::arr0(i as f64 * 10.0).into_dyn();
        writer.add_data([("x", Values::from(x)), ("y", Values::from(y))]).unwrap();
    }
    drop(writer);

    let data = read(&path, names::DATA, None, false).unwrap();
    assert_eq!(data.data_vals("y").unwrap(), &Values::from(vec![0.0, 10.0, 20.0, 30.0]));
}

#[test]
fn test_unknown_field_is_rejected() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let mut writer = DdzWriter::open(str2dd("x; y(x)").unwrap(), &path, names::DATA).unwrap();

    let err = writer.add_data([("w", one(1.0))]).unwrap_err();
    assert!(matches!(err, StorageError::Data(_)));
}

// =============================================================================
// Scoped lifetime
// =============================================================================

#[test]
fn test_drop_flushes_and_stamps_close_time() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    {
        let mut writer = DdzWriter::open(str2dd("x; y(x)").unwrap(), &path, names::DATA).unwrap();
        writer.add_data([("x", one(1.0)), ("y", one(2.0))]).unwrap();
        writer.add_data([("x", one(3.0))]).unwrap();
    }

    let data = read(&path, names::DATA, None, false).unwrap();
    assert_eq!(data.nrecords(), Some(1));
    assert!(data.meta_val("close_time_seconds").is_some());
    assert!(data.meta_val("last_change_time_seconds").is_some());

    // The log is free again.
    assert!(DdzWriter::open(str2dd("x; y(x)").unwrap(), &path, names::DATA).is_ok());
}

#[test]
fn test_close_twice_is_noop() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let mut writer = DdzWriter::open(str2dd("x; y(x)").unwrap(), &path, names::DATA).unwrap();

    writer.close().unwrap();
    assert!(writer.is_closed());
    writer.close().unwrap();
    assert!(writer.add_data([("x", one(1.0))]).is_err());
}

#[test]
fn test_data_folder_layout() {
    let dir = TempLogDir::new().unwrap();
    let options = WriterOptions {
        basedir: dir.path().to_path_buf(),
        name: "cooldown".to_string(),
        ..Default::default()
    };
    let writer = DdzWriter::open_with(str2dd("x; y(x)").unwrap(), options).unwrap();
    let path = writer.path().to_path_buf();
    drop(writer);

    assert!(path.starts_with(dir.path()));
    assert_eq!(path.file_name().unwrap(), "data.ddz");
    let folder = path.parent().unwrap().file_name().unwrap().to_str().unwrap();
    assert!(folder.ends_with("-cooldown"));
    assert!(path.is_dir());

    let data = read(&path, "data", None, true).unwrap();
    assert_eq!(data.meta_val(DATASET_NAME_META), Some(&serde_json::json!("cooldown")));
}

// =============================================================================
// Locking
// =============================================================================

#[test]
fn test_second_writer_fails_fast() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let structure = str2dd("x; y(x)").unwrap();
    let _writer = DdzWriter::open(structure.clone(), &path, names::DATA).unwrap();

    let err = DdzWriter::open(structure.clone(), &path, names::DATA).unwrap_err();
    assert!(matches!(err, StorageError::Busy(_)));
    assert!(err.is_contention());

    let err = datadict_to_ddz(&structure, &path, names::DATA, AppendMode::New, &StorageConfig::default())
        .unwrap_err();
    assert!(matches!(err, StorageError::Busy(_)));
}

#[test]
fn test_reader_times_out_on_held_access_lock() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    datadict_to_ddz(
        &str2dd("x; y(x)").unwrap(),
        &path,
        names::DATA,
        AppendMode::None,
        &StorageConfig::default(),
    )
    .unwrap();

    let config = StorageConfig::default().with_file_timeout(Duration::from_millis(100));
    let _held = AccessLock::acquire(&path, &config).unwrap();

    let err = datadict_from_ddz(&path, names::DATA, None, None, false, &config).unwrap_err();
    assert!(matches!(err, StorageError::Timeout { .. }));

    let err = record_counts(&path, names::DATA, &config).unwrap_err();
    assert!(matches!(err, StorageError::Timeout { .. }));
}

#[test]
fn test_readers_see_consistent_prefixes() {
    let dir = TempLogDir::new().unwrap();
    let path = dir.log_path("run");
    let mut writer = DdzWriter::open(str2dd("x; y; z(x, y)").unwrap(), &path, names::DATA).unwrap();
    const RECORDS: usize = 40;

    let producer = thread::spawn(move || {
        for i in 0..RECORDS {
            let v = i as f64;
            // Axes arrive before the dependent.
            writer.add_data([("x", one(v)), ("y", one(-v))]).unwrap();
            writer.add_data([("z", one(v * v))]).unwrap();
        }
        writer.close().unwrap();
    });

    let config = StorageConfig::default().with_file_timeout(Duration::from_secs(10));
    let mut last = 0;
    loop {
        let data = datadict_from_ddz(&path, names::DATA, None, None, false, &config).unwrap();
        let n = data.nrecords().expect("fields must agree on the record count");
        assert!(n >= last, "record count went backwards: {n} < {last}");
        let x = data.data_vals("x").unwrap().to_f64();
        let z = data.data_vals("z").unwrap().to_f64();
        for (xv, zv) in x.iter().zip(z.iter()) {
            assert_eq!(*zv, xv * xv);
        }
        last = n;
        if n == RECORDS || producer.is_finished() {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    producer.join().unwrap();

    let data = read(&path, names::DATA, None, false).unwrap();
    assert_eq!(data.nrecords(), Some(RECORDS));
}
