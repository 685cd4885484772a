//! Purpose: Default store location for the CLI.
//! Exports: `default_store_path` and `ensure_parent_dir`.
//! Role: Keep CLI path semantics in one place.
//! Invariants: Default store file remains `~/.sqlitekvs/store.db`.

use std::path::{Path, PathBuf};

use sqlitekvs::api::{Error, ErrorKind};

pub(crate) fn default_store_path() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".sqlitekvs").join("store.db")
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), Error> {
    let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) else {
        return Ok(());
    };
    std::fs::create_dir_all(parent).map_err(|err| {
        Error::new(ErrorKind::Open)
            .with_message("failed to create store directory")
            .with_path(parent)
            .with_source(err)
    })
}
