//! Backup-rename save
//!
//! The live file is renamed to its backup path, the backup's text is
//! patched, and the result is written back under the original name. Any
//! failure after the rename moves the backup back, so the file on disk is
//! either the old version or the new one.

use crate::config::EditorConfig;
use crate::{Error, Result};
use scinv_xml::{ChangeTracker, TextPatcher};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// File operations used by a save, replaceable for failure injection
pub trait Storage: fmt::Debug {
    fn read(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// The local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystem;

impl Storage for FileSystem {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[derive(Debug)]
pub struct PersistenceController<S: Storage = FileSystem> {
    storage: S,
    patcher: TextPatcher,
    backup_suffix: String,
    keep_backup: bool,
}

impl PersistenceController {
    pub fn new(config: &EditorConfig) -> Self {
        Self::with_storage(config, FileSystem)
    }
}

impl<S: Storage> PersistenceController<S> {
    pub fn with_storage(config: &EditorConfig, storage: S) -> Self {
        Self {
            storage,
            patcher: TextPatcher::new().with_indent_unit(config.indent_unit.clone()),
            backup_suffix: config.backup_suffix.clone(),
            keep_backup: config.keep_backup,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// `inventory.xml` becomes `inventory.xml.bak`
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(&self.backup_suffix);
        PathBuf::from(name)
    }

    /// Patch `path` in place with the pending changes and return the text
    /// now on disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] for I/O failures and [`Error::Patch`] if an
    /// entity cannot be located. In both cases the original file has been
    /// put back before the error is returned.
    pub fn save(&self, path: &Path, changes: &ChangeTracker) -> Result<String> {
        let backup = self.backup_path(path);
        let shown = path.display().to_string();

        if self.storage.exists(&backup) {
            debug!("Replacing stale backup {:?}", backup);
            self.storage
                .remove(&backup)
                .map_err(|e| Error::write("backup", &shown, e.to_string()))?;
        }
        self.storage
            .rename(path, &backup)
            .map_err(|e| Error::write("backup", &shown, e.to_string()))?;

        match self.write_patched(path, &backup, changes) {
            Ok(text) => {
                if !self.keep_backup {
                    if let Err(e) = self.storage.remove(&backup) {
                        warn!("Saved {} but could not remove backup: {}", shown, e);
                    }
                }
                info!("Saved {} ({} entities changed)", shown, changes.len());
                Ok(text)
            }
            Err(err) => {
                warn!("Save of {} failed, restoring backup: {}", shown, err);
                if let Err(e) = self.storage.rename(&backup, path) {
                    error!("Could not restore {} from {:?}: {}", shown, backup, e);
                    return Err(Error::write(
                        "rollback",
                        &shown,
                        format!("{err}; backup left at {}: {e}", backup.display()),
                    ));
                }
                Err(err)
            }
        }
    }

    fn write_patched(&self, path: &Path, backup: &Path, changes: &ChangeTracker) -> Result<String> {
        let shown = path.display().to_string();
        let raw = self
            .storage
            .read(backup)
            .map_err(|e| Error::write("read", &shown, e.to_string()))?;
        let patched = self.patcher.patch(&raw, changes)?;
        self.storage
            .write(path, &patched)
            .map_err(|e| Error::write("write", &shown, e.to_string()))?;
        Ok(patched)
    }

    /// Move the backup back over `path`. Returns `false` if there is no
    /// backup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the rename fails.
    pub fn restore_backup(&self, path: &Path) -> Result<bool> {
        let backup = self.backup_path(path);
        if !self.storage.exists(&backup) {
            debug!("No backup to restore for {:?}", path);
            return Ok(false);
        }
        self.storage
            .rename(&backup, path)
            .map_err(|e| Error::write("restore", path.display().to_string(), e.to_string()))?;
        info!("Restored {:?} from backup", path);
        Ok(true)
    }
}
