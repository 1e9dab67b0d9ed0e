//! Append-only on-disk log for datasets.
//!
//! A log is a Zarr V3 hierarchy in a directory with the `.ddz` extension.
//! Every dataset is a group, every field a growable array with the record
//! dimension first. One writer may grow a log while any number of readers
//! read consistent record prefixes from other threads or processes.
//!
//! # Architecture
//!
//! ```text
//! <dir>/run.ddz/                 ~run.writer.lock   (writer ownership)
//!   zarr.json   (root group)     ~run.lock          (flush / read access)
//!   data/
//!     zarr.json (fields, meta, timestamps)
//!     x/  zarr.json + chunks     records × inner dims
//!     z/  zarr.json + chunks
//! ```
//!
//! ```text
//! DdzWriter::add_data ──► buffer until every field has the record
//!                              │
//!                              ▼
//!                    datadict_to_ddz(mode = New) ──► access lock ──► resize + write
//!
//! datadict_from_ddz ──► access lock ──► cut each dependency group ──► DataDict
//! ```
//!
//! # Example
//!
//! ```ignore
//! use datadict::{str2dd, Values};
//! use datadict_storage::{read, DdzWriter};
//!
//! let structure = str2dd("x; y(x)")?;
//! {
//!     let mut writer = DdzWriter::open(structure, "run.ddz", "data")?;
//!     writer.add_data([("x", Values::from(vec![1.0])), ("y", Values::from(vec![2.0]))])?;
//! } // flushed and closed here
//!
//! let data = read("run.ddz", "data", None, false)?;
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod layout;
pub mod lock;
pub mod read;
pub mod write;
pub mod writer;

// Re-export commonly used types at crate root
pub use codec::{strip_stamps, Stamp};
pub use config::StorageConfig;
pub use error::{Result, StorageError};
pub use layout::{data_folder_path, DDZ_EXTENSION};
pub use lock::{AccessLock, WriterLock};
pub use read::{all_datadicts_from_ddz, datadict_from_ddz, list_datasets, read, record_counts};
pub use write::{datadict_to_ddz, AppendMode};
pub use writer::{DdzWriter, WriterOptions, DATASET_NAME_META};
