//! Crash-safe persistence of the live share configuration.
//!
//! [`ConfFileStore::persist`] performs three steps, in this order:
//!
//! 1. **Backup** – the previous document is written verbatim to
//!    `<backup_dir>/<file name>.backup.<YYYYmmdd_HHMMSS.ffffff>`.  If this
//!    fails the live file is never touched.
//! 2. **Atomic replace** – the new document goes to a temporary file in the
//!    live file's own directory, gets its permissions, is flushed to disk
//!    and is then renamed over the live path.  A reader therefore sees
//!    either the whole old file or the whole new file, never a mix.
//! 3. **Pruning** – only after the replace succeeded are the oldest backups
//!    beyond `max_backups` deleted, so a failed write never costs history.
//!
//! The live file must be UTF-8.  Anything else is reported as
//! [`StoreError::NotUtf8`] instead of being decoded lossily, which would
//! corrupt the bytes on the next write.
//!
//! # Why the temp file lives next to the target (for beginners)
//!
//! `rename(2)` is only atomic within one filesystem.  Creating the temporary
//! file in the same directory as `smb.conf` guarantees the rename never turns
//! into a copy.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use smbshare_core::{default_document, parse, Document};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::application::manage_shares::{ConfigStore, PersistReceipt, StoreError};
use crate::infrastructure::storage::config::{ConfigError, StorageConfig};

/// `strftime` pattern of the backup suffix; sorts chronologically as text.
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S%.6f";

/// Attempts at finding a free backup name before giving up.
const BACKUP_NAME_ATTEMPTS: u32 = 16;

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_MAX_BACKUPS: usize = 20;

/// Returns `true` when `path` names an existing file or directory.
pub fn path_exists(path: &str) -> bool {
    Path::new(path).exists()
}

/// File-backed [`ConfigStore`] for the live share configuration.
#[derive(Debug, Clone)]
pub struct ConfFileStore {
    conf_path: PathBuf,
    backup_dir: PathBuf,
    max_backups: usize,
    file_mode: u32,
}

impl ConfFileStore {
    pub fn new(conf_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            conf_path: conf_path.into(),
            backup_dir: backup_dir.into(),
            max_backups: DEFAULT_MAX_BACKUPS,
            file_mode: DEFAULT_FILE_MODE,
        }
    }

    /// Builds a store from the `[storage]` settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unparsable `file_mode`.
    pub fn from_config(config: &StorageConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.conf_path, &config.backup_dir)
            .with_max_backups(config.max_backups)
            .with_file_mode(config.file_mode_bits()?))
    }

    /// Keeps at most `max_backups` backups; `0` disables pruning.
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    pub fn conf_path(&self) -> &Path {
        &self.conf_path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// `smb.conf.backup.` for a live file named `smb.conf`.
    fn backup_prefix(&self) -> String {
        let file_name = self
            .conf_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "smb.conf".to_string());
        format!("{file_name}.backup.")
    }

    fn live_dir(&self) -> &Path {
        match self.conf_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    // ── Backup ────────────────────────────────────────────────────────────────

    fn write_backup(&self, old: &Document) -> Result<PathBuf, StoreError> {
        let backup_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| StoreError::Backup { path, source }
        };

        fs::create_dir_all(&self.backup_dir).map_err(backup_err(&self.backup_dir))?;

        let mut tmp = Builder::new()
            .prefix(".smbshare-backup.")
            .tempfile_in(&self.backup_dir)
            .map_err(backup_err(&self.backup_dir))?;
        write_synced(&mut tmp, old).map_err(backup_err(tmp.path()))?;

        let prefix = self.backup_prefix();
        let mut stamp = Local::now();
        for _ in 0..BACKUP_NAME_ATTEMPTS {
            let target = self
                .backup_dir
                .join(format!("{prefix}{}", stamp.format(BACKUP_TIMESTAMP_FORMAT)));
            match tmp.persist_noclobber(&target) {
                Ok(_) => return Ok(target),
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    tmp = e.file;
                    stamp += chrono::Duration::microseconds(1);
                }
                Err(e) => return Err(backup_err(&target)(e.error)),
            }
        }
        Err(StoreError::Backup {
            path: self.backup_dir.clone(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "no free backup file name available",
            ),
        })
    }

    /// Deletes the oldest backups beyond `max_backups`.  Failures are logged
    /// and never fail the write that triggered the pruning.
    fn prune_backups(&self) {
        if self.max_backups == 0 {
            return;
        }
        let backups = match self.list_backups() {
            Ok(backups) => backups,
            Err(e) => {
                warn!("could not list backups for pruning: {e}");
                return;
            }
        };
        let excess = backups.len().saturating_sub(self.max_backups);
        for old in backups.iter().take(excess) {
            match fs::remove_file(old) {
                Ok(()) => debug!(path = %old.display(), "pruned backup"),
                Err(e) => warn!(path = %old.display(), "could not prune backup: {e}"),
            }
        }
    }

    // ── Live file ─────────────────────────────────────────────────────────────

    fn write_live(&self, new: &Document) -> Result<(), StoreError> {
        let write_err = |source: io::Error| StoreError::Write {
            path: self.conf_path.clone(),
            source,
        };

        let dir = self.live_dir();
        let mut tmp = Builder::new()
            .prefix(".smbshare.")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(write_err)?;
        set_mode(tmp.as_file(), self.file_mode).map_err(write_err)?;
        write_synced(&mut tmp, new).map_err(write_err)?;

        // On failure the returned PersistError owns the temp file and
        // deletes it when dropped.
        tmp.persist(&self.conf_path).map_err(|e| write_err(e.error))?;

        if let Err(e) = sync_dir(dir) {
            debug!(dir = %dir.display(), "directory fsync skipped: {e}");
        }
        Ok(())
    }
}

impl ConfigStore for ConfFileStore {
    fn load(&self) -> Result<Document, StoreError> {
        match fs::read(&self.conf_path) {
            Ok(bytes) => {
                let text = String::from_utf8(bytes).map_err(|e| StoreError::NotUtf8 {
                    path: self.conf_path.clone(),
                    offset: e.utf8_error().valid_up_to(),
                })?;
                Ok(parse(&text))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.conf_path.display(), "no configuration yet, using default");
                Ok(default_document())
            }
            Err(source) => Err(StoreError::Read {
                path: self.conf_path.clone(),
                source,
            }),
        }
    }

    fn persist(&self, old: &Document, new: &Document) -> Result<PersistReceipt, StoreError> {
        let backup_path = self.write_backup(old)?;
        debug!(backup = %backup_path.display(), "previous configuration backed up");
        self.write_live(new)?;
        self.prune_backups();
        Ok(PersistReceipt { backup_path })
    }

    fn list_backups(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.backup_dir.clone(),
                    source,
                })
            }
        };

        let prefix = self.backup_prefix();
        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Read {
                path: self.backup_dir.clone(),
                source,
            })?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                backups.push(entry.path());
            }
        }
        backups.sort();
        Ok(backups)
    }
}

fn write_synced(tmp: &mut NamedTempFile, document: &Document) -> io::Result<()> {
    tmp.write_all(document.render().as_bytes())?;
    tmp.flush()?;
    tmp.as_file().sync_all()
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
