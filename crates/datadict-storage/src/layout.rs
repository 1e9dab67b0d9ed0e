//! Where things live: log directories, lock files, Zarr node paths and
//! the automatic data-folder layout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use uuid::Uuid;
use zarrs_filesystem::FilesystemStore;
use zarrs_storage::{ListableStorageTraits, StorePrefix, WritableStorageTraits};

use crate::error::{Result, StorageError};

/// File extension of a log directory.
pub const DDZ_EXTENSION: &str = "ddz";

/// Name of the Zarr V3 node metadata document.
const NODE_METADATA: &str = "zarr.json";

/// Log path with the `.ddz` extension added when missing.
pub fn with_extension(path: &Path) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some(DDZ_EXTENSION) {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(DDZ_EXTENSION);
        PathBuf::from(name)
    }
}

/// Lock file `~<stem><suffix>` next to the log at `target`.
pub fn lock_path(target: &Path, suffix: &str) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = target.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("~{stem}{suffix}"))
}

/// Automatic log location for a new measurement.
///
/// `<basedir>/YYYY-MM-DD/YYYY-MM-DDTHHMMSS_<id>-<name>/<filename>.ddz`, where
/// `<id>` is the first 8 characters of a random UUID.
pub fn data_folder_path(
    basedir: &Path,
    name: &str,
    filename: &str,
    time: DateTime<Local>,
) -> PathBuf {
    let id = Uuid::new_v4().simple().to_string();
    let id = &id[..8];
    let folder = if name.is_empty() {
        format!("{}_{id}", time.format("%Y-%m-%dT%H%M%S"))
    } else {
        format!("{}_{id}-{name}", time.format("%Y-%m-%dT%H%M%S"))
    };
    basedir
        .join(time.format("%Y-%m-%d").to_string())
        .join(folder)
        .join(format!("{filename}.{DDZ_EXTENSION}"))
}

/// Reject names that cannot be used as a single Zarr node name.
pub fn check_node_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.starts_with("__") || name == "." || name == ".." {
        return Err(StorageError::invalid_metadata(format!(
            "'{name}' cannot be used as a dataset or field name"
        )));
    }
    Ok(())
}

/// Zarr path of the group holding dataset `group`.
pub fn group_node(group: &str) -> String {
    format!("/{group}")
}

/// Zarr path of the array holding `field` of dataset `group`.
pub fn array_node(group: &str, field: &str) -> String {
    format!("/{group}/{field}")
}

/// Whether the log at `root` holds a node (group or array) at `node`.
pub fn node_exists(root: &Path, node: &str) -> bool {
    root.join(node.trim_start_matches('/'))
        .join(NODE_METADATA)
        .is_file()
}

/// Create the directory the log at `path` lives in.
pub fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Open the Zarr store of an existing log.
pub fn open_store(root: &Path) -> Result<Arc<FilesystemStore>> {
    if !root.is_dir() {
        return Err(StorageError::not_found(format!("no log at {}", root.display())));
    }
    let store = FilesystemStore::new(root).map_err(|e| StorageError::zarr(e.to_string()))?;
    Ok(Arc::new(store))
}

/// Open the Zarr store of a log, creating the directory if needed.
pub fn create_store(root: &Path) -> Result<Arc<FilesystemStore>> {
    std::fs::create_dir_all(root)?;
    open_store(root)
}

/// Names of all dataset groups in the log, sorted.
pub fn list_groups(store: &FilesystemStore, root: &Path) -> Result<Vec<String>> {
    let listing = store
        .list_dir(&StorePrefix::root())
        .map_err(|e| StorageError::zarr(e.to_string()))?;
    let mut groups: Vec<String> = listing
        .prefixes()
        .iter()
        .map(|p| p.as_str().trim_end_matches('/').to_string())
        .filter(|name| node_exists(root, name))
        .collect();
    groups.sort();
    Ok(groups)
}

/// Remove a dataset group and everything in it.
pub fn remove_group(store: &FilesystemStore, group: &str) -> Result<()> {
    let prefix =
        StorePrefix::new(format!("{group}/")).map_err(|e| StorageError::zarr(e.to_string()))?;
    store
        .erase_prefix(&prefix)
        .map_err(|e| StorageError::zarr(e.to_string()))?;
    Ok(())
}
