//! Datasets for swept measurement data.
//!
//! This crate models multi-dimensional measurement results as named fields:
//! independent **axes** and **dependents** that list the axes they were
//! measured against. Two layouts are supported:
//!
//! - **Tabular** ([`DataDict`]): one entry per record, as data arrives
//! - **Grid** ([`MeshgridDataDict`]): dense arrays with one dimension per axis
//!
//! # Architecture
//!
//! ```text
//! producer records
//!      │
//!      ▼
//! DataDict::add_data ──► validate (all violations at once)
//!      │
//!      ├─► datadict_to_meshgrid
//!      │         │
//!      │         ├─► guess shape from sweep periods (or explicit shape)
//!      │         ├─► pad incomplete sweeps with NaN
//!      │         └─► interpolate / crop invalid vertices
//!      │
//!      └─► combine_datadicts (rename on conflict)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use datadict::{str2dd, datadict_to_meshgrid, Values};
//!
//! let mut dd = str2dd("x[V]; y[V]; z[A](x, y)")?;
//! dd.add_data([("x", Values::from(vec![0.0, 0.0])),
//!              ("y", Values::from(vec![0.0, 1.0])),
//!              ("z", Values::from(vec![1e-3, 2e-3]))])?;
//! let grid = datadict_to_meshgrid(&dd, None, None)?;
//! ```

pub mod base;
pub mod combine;
pub mod convert;
pub mod datadict;
pub mod error;
pub mod field;
pub mod meshgrid;
pub mod num;
pub mod parse;
pub mod values;

// Re-export commonly used types at crate root
pub use base::{datasets_are_equal, DataDictBase};
pub use combine::combine_datadicts;
pub use convert::{datadict_to_meshgrid, datadict_to_meshgrid_with, meshgrid_to_datadict, GridOptions};
pub use datadict::DataDict;
pub use error::{DataDictError, Result};
pub use field::{Field, FieldInfo, Meta, MetaValue};
pub use meshgrid::MeshgridDataDict;
pub use num::SweepPeriod;
pub use parse::str2dd;
pub use values::{DType, Values};
