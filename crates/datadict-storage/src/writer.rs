//! Scoped incremental writer.
//!
//! A [`DdzWriter`] owns a log for as long as it lives. Records handed to
//! [`DdzWriter::add_data`] are buffered per field until every field has them,
//! then moved into the in-memory dataset and flushed in [`AppendMode::New`],
//! so only records not yet on disk are written.
//!
//! Dropping the writer flushes complete records, stamps the close time and
//! releases the log. Incomplete records are discarded with a warning.

use std::path::{Path, PathBuf};

use chrono::Local;
use datadict::{DataDict, DataDictError, Values};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::codec::Stamp;
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::layout::{create_parent, data_folder_path, with_extension};
use crate::lock::WriterLock;
use crate::write::{stamp_group, write_datadict, AppendMode};

/// Meta key holding the measurement name.
pub const DATASET_NAME_META: &str = "dataset.name";

/// Where and how a [`DdzWriter`] writes.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Root of the automatic data folder layout.
    pub basedir: PathBuf,
    /// Dataset name inside the log.
    pub groupname: String,
    /// Measurement name, used in the data folder name and stored as meta.
    pub name: String,
    /// Stem of the log file in the data folder.
    pub filename: String,
    /// Explicit log path. Overrides the data folder layout.
    pub filepath: Option<PathBuf>,
    pub config: StorageConfig,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            basedir: PathBuf::from("."),
            groupname: "data".to_string(),
            name: String::new(),
            filename: "data".to_string(),
            filepath: None,
            config: StorageConfig::default(),
        }
    }
}

/// Single writer of one dataset in one log.
#[derive(Debug)]
pub struct DdzWriter {
    data: DataDict,
    path: PathBuf,
    groupname: String,
    config: StorageConfig,
    pending: IndexMap<String, Values>,
    lock: Option<WriterLock>,
}

impl DdzWriter {
    /// Open the log at `path` and write the initial content of `data` into
    /// dataset `groupname`, replacing what was stored there.
    pub fn open(data: DataDict, path: impl AsRef<Path>, groupname: &str) -> Result<Self> {
        Self::open_with(
            data,
            WriterOptions {
                groupname: groupname.to_string(),
                filepath: Some(path.as_ref().to_path_buf()),
                ..Default::default()
            },
        )
    }

    /// Open a log as described by `options`.
    pub fn open_with(mut data: DataDict, options: WriterOptions) -> Result<Self> {
        options.config.validate().map_err(StorageError::Config)?;
        data.validate()?;

        let path = match &options.filepath {
            Some(path) => with_extension(path),
            None => data_folder_path(&options.basedir, &options.name, &options.filename, Local::now()),
        };
        create_parent(&path)?;

        let lock = WriterLock::acquire(&path)?;
        if !options.name.is_empty() {
            data.add_meta(DATASET_NAME_META, options.name.clone());
        }
        write_datadict(&data, &path, &options.groupname, AppendMode::None, &options.config)?;
        info!(path = %path.display(), group = %options.groupname, "opened log for writing");

        Ok(Self {
            data,
            path,
            groupname: options.groupname,
            config: options.config,
            pending: IndexMap::new(),
            lock: Some(lock),
        })
    }

    /// Add records for some or all fields.
    ///
    /// Records are kept back until every field has received them; the
    /// complete ones are flushed right away.
    pub fn add_data<I, S, V>(&mut self, data: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Values>,
    {
        if self.lock.is_none() {
            return Err(StorageError::Config("writer is closed".to_string()));
        }

        let mut pending = self.pending.clone();
        for (name, values) in data {
            let name = name.into();
            if !self.data.contains(&name) {
                return Err(DataDictError::FieldNotFound(name).into());
            }
            let values: Values = values.into();
            let values = if values.ndim() == 0 {
                values.reshape(&[1])?
            } else {
                values
            };
            let merged = match pending.get(&name) {
                Some(buffered) => buffered.concat_rows(&values)?,
                None => values,
            };
            pending.insert(name, merged);
        }

        let complete = self
            .data
            .field_names()
            .iter()
            .map(|name| pending.get(name).map_or(0, Values::nrows))
            .min()
            .unwrap_or(0);
        if complete == 0 {
            self.pending = pending;
            debug!(pending = ?self.pending_records(), "buffered incomplete records");
            return Ok(());
        }

        let mut batch = Vec::with_capacity(pending.len());
        for (name, values) in pending.iter_mut() {
            batch.push((name.clone(), values.slice_rows(0, complete)));
            *values = values.slice_rows(complete, values.nrows());
        }
        self.data.add_data(batch)?;
        pending.retain(|_, v| v.nrows() > 0);
        self.pending = pending;

        self.flush()
    }

    /// Write all records not yet on disk.
    pub fn flush(&mut self) -> Result<()> {
        let written = write_datadict(
            &self.data,
            &self.path,
            &self.groupname,
            AppendMode::New,
            &self.config,
        )?;
        debug!(path = %self.path.display(), records = written, "flushed");
        Ok(())
    }

    /// Flush, stamp the close time and release the log.
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(lock) = self.lock.take() else {
            return Ok(());
        };
        if !self.pending.is_empty() {
            warn!(
                path = %self.path.display(),
                pending = ?self.pending_records(),
                "discarding incomplete records"
            );
        }
        self.flush()?;
        stamp_group(&self.path, &self.groupname, Stamp::Close, &self.config)?;
        drop(lock);
        info!(path = %self.path.display(), records = ?self.data.nrecords(), "closed log");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn groupname(&self) -> &str {
        &self.groupname
    }

    /// Everything written so far.
    pub fn datadict(&self) -> &DataDict {
        &self.data
    }

    /// Buffered records per field that are not yet part of a complete record.
    pub fn pending_records(&self) -> IndexMap<String, usize> {
        self.pending
            .iter()
            .map(|(name, values)| (name.clone(), values.nrows()))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock.is_none()
    }
}

impl Drop for DdzWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "failed to close log");
        }
    }
}
