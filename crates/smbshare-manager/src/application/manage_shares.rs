//! ManageSharesUseCase: the CRUD contract over the managed shares.
//!
//! [`ShareManager`] is the only component that changes the configuration
//! file.  Each mutating call is one critical section:
//!
//! ```text
//! lock ─► load document ─► build registry ─► validate + plan
//!      ─► backup old document ─► atomic write ─► reconcile service ─► unlock
//! ```
//!
//! The registry is rebuilt from the file on every call, never cached, so a
//! hand edit made between two requests is always seen by the second one.
//!
//! # Outcome of a mutation
//!
//! | Result                                  | File changed? |
//! |-----------------------------------------|---------------|
//! | `Ok(MutationReceipt)`                   | yes           |
//! | `Err(Validation(_))`                    | no            |
//! | `Err(ReadFailed / BackupFailed / WriteFailed)` | no     |
//! | `Err(AppliedButNotReconciled)`          | yes           |
//!
//! `AppliedButNotReconciled` is not rolled back: a service restart cannot be
//! undone reliably, so the caller must surface "saved, but the service needs
//! a manual restart".

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use smbshare_core::{Document, Mutator, Share, ShareError, ShareRegistry, ShareSpec};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::reconcile_service::{restart_within, ReconcileError, ServiceReconciler, ServiceState};

/// Default bound on a service restart.
pub const DEFAULT_RESTART_TIMEOUT: Duration = Duration::from_secs(30);

/// Answers whether a share path exists on the filesystem.
pub type PathCheck = dyn Fn(&str) -> bool + Send + Sync;

/// Error type for the configuration store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The live file (or backup directory) could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The live file is not UTF-8 text.  It is never rewritten in that state,
    /// so a file in a legacy encoding has to be converted by hand first.
    #[error(
        "{path} is not valid UTF-8 (first invalid byte at offset {offset}); \
         convert it to UTF-8 before managing shares"
    )]
    NotUtf8 { path: PathBuf, offset: usize },

    /// The backup of the previous document could not be written.
    #[error("failed to back up configuration to {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The new document could not replace the live file.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a committed write left its backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReceipt {
    pub backup_path: PathBuf,
}

/// Storage abstraction for the configuration document.
///
/// The production implementation is
/// [`crate::infrastructure::storage::persister::ConfFileStore`].
pub trait ConfigStore: Send + Sync {
    /// Reads the live document (the built-in default when the file is absent).
    fn load(&self) -> Result<Document, StoreError>;

    /// Backs up `old`, then atomically replaces the live file with `new`.
    ///
    /// A backup failure must leave the live file untouched.
    fn persist(&self, old: &Document, new: &Document) -> Result<PersistReceipt, StoreError>;

    /// Existing backups, oldest first.
    fn list_backups(&self) -> Result<Vec<PathBuf>, StoreError>;
}

/// Error type for share operations.
#[derive(Debug, Error)]
pub enum ShareOpError {
    /// The request was rejected before anything was written.
    #[error(transparent)]
    Validation(#[from] ShareError),

    #[error("could not read the share configuration: {0}")]
    ReadFailed(#[source] StoreError),

    #[error("backup failed, configuration left unchanged: {0}")]
    BackupFailed(#[source] StoreError),

    #[error("write failed, configuration left unchanged: {0}")]
    WriteFailed(#[source] StoreError),

    /// The file was updated but the service did not pick it up.
    #[error("configuration saved but the file-sharing service needs a manual restart: {reason}")]
    AppliedButNotReconciled {
        backup_path: PathBuf,
        #[source]
        reason: ReconcileError,
    },
}

impl From<StoreError> for ShareOpError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Read { .. } | StoreError::NotUtf8 { .. } => ShareOpError::ReadFailed(err),
            StoreError::Backup { .. } => ShareOpError::BackupFailed(err),
            StoreError::Write { .. } => ShareOpError::WriteFailed(err),
        }
    }
}

impl ShareOpError {
    /// `true` when the new configuration is on disk despite the error.
    pub fn is_committed(&self) -> bool {
        matches!(self, ShareOpError::AppliedButNotReconciled { .. })
    }

    /// Stable machine-readable name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            ShareOpError::Validation(ShareError::InvalidName { .. }) => "InvalidName",
            ShareOpError::Validation(ShareError::InvalidField { .. }) => "InvalidField",
            ShareOpError::Validation(ShareError::PathNotFound { .. }) => "PathNotFound",
            ShareOpError::Validation(ShareError::NameConflict { .. }) => "NameConflict",
            ShareOpError::Validation(ShareError::NotFound { .. }) => "NotFound",
            ShareOpError::ReadFailed(_) => "ReadFailed",
            ShareOpError::BackupFailed(_) => "BackupFailed",
            ShareOpError::WriteFailed(_) => "WriteFailed",
            ShareOpError::AppliedButNotReconciled { .. } => "AppliedButNotReconciled",
        }
    }
}

/// Result of a fully successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReceipt {
    /// Backup holding the document as it was before the call.
    pub backup_path: PathBuf,
}

/// The share administration use case.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct ShareManager {
    store: Arc<dyn ConfigStore>,
    reconciler: Arc<dyn ServiceReconciler>,
    path_exists: Arc<PathCheck>,
    restart_timeout: Duration,
    /// Serializes every mutation of the file.
    write_lock: Mutex<()>,
}

impl ShareManager {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        reconciler: Arc<dyn ServiceReconciler>,
        path_exists: Arc<PathCheck>,
    ) -> Self {
        Self {
            store,
            reconciler,
            path_exists,
            restart_timeout: DEFAULT_RESTART_TIMEOUT,
            write_lock: Mutex::new(()),
        }
    }

    /// Overrides the bound on service restarts.
    pub fn with_restart_timeout(mut self, timeout: Duration) -> Self {
        self.restart_timeout = timeout;
        self
    }

    // ── Read-only operations ──────────────────────────────────────────────────

    /// Returns every managed share in file order.
    pub fn list_shares(&self) -> Result<Vec<Share>, ShareOpError> {
        Ok(self.registry()?.all())
    }

    pub fn get_share(&self, name: &str) -> Result<Option<Share>, ShareOpError> {
        Ok(self.registry()?.lookup(name).cloned())
    }

    /// Returns the users allowed on share `name`; empty when the share is
    /// unrestricted or does not exist.
    pub fn get_share_users(&self, name: &str) -> Result<Vec<String>, ShareOpError> {
        Ok(self
            .registry()?
            .lookup(name)
            .map(|share| share.valid_users.clone())
            .unwrap_or_default())
    }

    /// Backups written so far, oldest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>, ShareOpError> {
        Ok(self.store.list_backups()?)
    }

    /// Reports the state of each service component.
    pub async fn service_status(&self) -> BTreeMap<String, ServiceState> {
        self.reconciler.status().await
    }

    /// Restarts the service outside of any mutation.
    pub async fn restart_service(&self) -> bool {
        match restart_within(self.reconciler.as_ref(), self.restart_timeout).await {
            Ok(()) => {
                info!("file-sharing service restarted");
                true
            }
            Err(e) => {
                error!("failed to restart file-sharing service: {e}");
                false
            }
        }
    }

    // ── Mutating operations ───────────────────────────────────────────────────

    /// Adds a new share.
    ///
    /// # Errors
    ///
    /// See the module-level outcome table.
    pub async fn add_share(&self, spec: ShareSpec) -> Result<MutationReceipt, ShareOpError> {
        self.mutate("add", |m| m.add(&spec)).await
    }

    /// Replaces share `old_name` with `spec` (which may rename it).
    pub async fn update_share(
        &self,
        old_name: &str,
        spec: ShareSpec,
    ) -> Result<MutationReceipt, ShareOpError> {
        self.mutate("update", |m| m.update(old_name, &spec)).await
    }

    pub async fn delete_share(&self, name: &str) -> Result<MutationReceipt, ShareOpError> {
        self.mutate("delete", |m| m.delete(name)).await
    }

    /// Replaces the user list of share `name`, keeping its other fields.
    pub async fn set_share_users(
        &self,
        name: &str,
        users: Vec<String>,
    ) -> Result<MutationReceipt, ShareOpError> {
        self.mutate("set-users", |m| m.set_users(name, &users)).await
    }

    fn registry(&self) -> Result<ShareRegistry, ShareOpError> {
        let document = self.store.load()?;
        Ok(ShareRegistry::from_document(&document))
    }

    async fn mutate<F>(
        &self,
        operation: &'static str,
        plan: F,
    ) -> Result<MutationReceipt, ShareOpError>
    where
        F: FnOnce(&Mutator<&PathCheck>) -> Result<Document, ShareError>,
    {
        let _guard = self.write_lock.lock().await;

        let receipt = {
            let current = self.store.load()?;
            let mutator: Mutator<&PathCheck> = Mutator::new(current, self.path_exists.as_ref());
            let next = plan(&mutator).map_err(|e| {
                warn!(operation, field = e.field(), "request rejected: {e}");
                e
            })?;
            self.store.persist(mutator.document(), &next).map_err(|e| {
                error!(operation, "configuration not saved: {e}");
                e
            })?
        };
        info!(
            operation,
            backup = %receipt.backup_path.display(),
            "share configuration committed"
        );

        match restart_within(self.reconciler.as_ref(), self.restart_timeout).await {
            Ok(()) => Ok(MutationReceipt {
                backup_path: receipt.backup_path,
            }),
            Err(reason) => {
                warn!(operation, "configuration saved but service not reconciled: {reason}");
                Err(ShareOpError::AppliedButNotReconciled {
                    backup_path: receipt.backup_path,
                    reason,
                })
            }
        }
    }
}
