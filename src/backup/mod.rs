//! Backup Store (spec §4.9): durable, content-addressed snapshots of
//! pre-change file contents, with restore/list/cleanup.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::core::errors::{CoreError, Result};

/// One file's record within a backup's `metadata.json` (spec §6 on-disk layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFileEntry {
    /// Absolute path of the original file at snapshot time.
    pub original_path: PathBuf,
    /// Path of the verbatim copy, relative to the backup's `payload/` root.
    pub backup_path: PathBuf,
    /// Size in bytes at snapshot time.
    pub size: u64,
    /// SHA-256 of the original contents, for tamper detection on restore.
    pub sha256: String,
}

/// `metadata.json` contents for one backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Operation that triggered this snapshot (e.g. `apply_deduplication`).
    pub operation: String,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// Snapshotted files.
    pub files: Vec<BackupFileEntry>,
}

/// Summary entry returned by [`BackupStore::list`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Backup directory name (`YYYYMMDD-HHMMSS-<short-hash>`).
    pub id: String,
    /// Creation timestamp, as recorded in `metadata.json`.
    pub created_at: String,
    /// Operation tag.
    pub operation_tag: String,
    /// Number of files snapshotted.
    pub file_count: usize,
}

/// Outcome of a [`BackupStore::restore`] call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Files successfully restored.
    pub restored_files: Vec<PathBuf>,
    /// Files that failed to restore, with an error message.
    pub errors: Vec<(PathBuf, String)>,
}

/// Content-addressed backup store rooted at a single directory.
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    /// Open (and lazily create) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Snapshot `files` verbatim under a new timestamped backup directory
    /// and return its id.
    pub fn create(&self, files: &[PathBuf], project_root: &Path, operation_tag: &str) -> Result<String> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| CoreError::storage_io("failed to create backups root", e))?;

        let now = Utc::now();
        let short_hash = {
            let mut hasher = Sha256::new();
            hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
            for f in files {
                hasher.update(f.to_string_lossy().as_bytes());
            }
            hex::encode(hasher.finalize())[..8].to_string()
        };
        let timestamp_label = now.format("%Y%m%d-%H%M%S").to_string();
        let backup_id = format!("{timestamp_label}-{short_hash}");
        let backup_dir = self.root.join(&backup_id);
        let payload_dir = backup_dir.join("payload");
        std::fs::create_dir_all(&payload_dir)
            .map_err(|e| CoreError::storage_io("failed to create backup payload dir", e))?;

        let mut entries = Vec::new();
        for file in files {
            let relative = file.strip_prefix(project_root).unwrap_or(file);
            let dest = payload_dir.join(relative);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CoreError::storage_io("failed to create backup subdirectory", e))?;
            }
            let contents = std::fs::read(file)
                .map_err(|e| CoreError::storage_io(format!("failed to read {}", file.display()), e))?;
            std::fs::write(&dest, &contents)
                .map_err(|e| CoreError::storage_io(format!("failed to write {}", dest.display()), e))?;

            let sha256 = hex::encode(Sha256::digest(&contents));
            entries.push(BackupFileEntry {
                original_path: file.clone(),
                backup_path: relative.to_path_buf(),
                size: contents.len() as u64,
                sha256,
            });
        }

        let metadata = BackupMetadata {
            operation: operation_tag.to_string(),
            created_at: now.to_rfc3339(),
            files: entries,
        };
        let metadata_json = serde_json::to_string_pretty(&metadata)?;
        std::fs::write(backup_dir.join("metadata.json"), metadata_json)
            .map_err(|e| CoreError::storage_io("failed to write backup metadata.json", e))?;

        info!(backup_id = %backup_id, file_count = files.len(), "backup created");
        Ok(backup_id)
    }

    fn read_metadata(&self, backup_id: &str) -> Result<BackupMetadata> {
        let path = self.root.join(backup_id).join("metadata.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| CoreError::storage_io(format!("failed to read {}", path.display()), e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Restore every file in `backup_id` to its original absolute path.
    /// Tampered payload bytes (sha256 mismatch) are restored anyway but
    /// reported as a `ConflictError`-shaped entry in `errors`, since the
    /// caller asked for the bytes that exist, not a promise they're pristine.
    pub fn restore(&self, backup_id: &str) -> Result<RestoreReport> {
        let metadata = self.read_metadata(backup_id)?;
        let payload_dir = self.root.join(backup_id).join("payload");
        let mut report = RestoreReport::default();

        for entry in metadata.files {
            let source = payload_dir.join(&entry.backup_path);
            match std::fs::read(&source) {
                Ok(bytes) => {
                    let actual_sha = hex::encode(Sha256::digest(&bytes));
                    if actual_sha != entry.sha256 {
                        warn!(path = %entry.original_path.display(), "backup payload sha256 mismatch on restore");
                        report.errors.push((
                            entry.original_path.clone(),
                            "payload sha256 mismatch: possible tampering".to_string(),
                        ));
                    }
                    if let Some(parent) = entry.original_path.parent() {
                        let _ = std::fs::create_dir_all(parent);
                    }
                    match std::fs::write(&entry.original_path, &bytes) {
                        Ok(()) => report.restored_files.push(entry.original_path.clone()),
                        Err(e) => report.errors.push((entry.original_path.clone(), e.to_string())),
                    }
                }
                Err(e) => report.errors.push((entry.original_path.clone(), e.to_string())),
            }
        }
        Ok(report)
    }

    /// Restore a single file from `backup_id` by its original absolute path,
    /// leaving every other file in the backup untouched. Used for file-local
    /// rollback of a batch fix, where only one file in the batch failed to
    /// write and the others must keep their already-applied changes.
    pub fn restore_file(&self, backup_id: &str, original_path: &Path) -> Result<RestoreReport> {
        let metadata = self.read_metadata(backup_id)?;
        let payload_dir = self.root.join(backup_id).join("payload");
        let mut report = RestoreReport::default();

        let Some(entry) = metadata
            .files
            .into_iter()
            .find(|e| e.original_path == original_path)
        else {
            report
                .errors
                .push((original_path.to_path_buf(), "no such file in backup".to_string()));
            return Ok(report);
        };

        let source = payload_dir.join(&entry.backup_path);
        match std::fs::read(&source) {
            Ok(bytes) => {
                let actual_sha = hex::encode(Sha256::digest(&bytes));
                if actual_sha != entry.sha256 {
                    warn!(path = %entry.original_path.display(), "backup payload sha256 mismatch on restore");
                    report.errors.push((
                        entry.original_path.clone(),
                        "payload sha256 mismatch: possible tampering".to_string(),
                    ));
                }
                if let Some(parent) = entry.original_path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                match std::fs::write(&entry.original_path, &bytes) {
                    Ok(()) => report.restored_files.push(entry.original_path.clone()),
                    Err(e) => report.errors.push((entry.original_path.clone(), e.to_string())),
                }
            }
            Err(e) => report.errors.push((entry.original_path.clone(), e.to_string())),
        }
        Ok(report)
    }

    /// List every backup under this store, newest first.
    pub fn list(&self) -> Result<Vec<BackupEntry>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dir_entry in std::fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let id = dir_entry.file_name().to_string_lossy().to_string();
            match self.read_metadata(&id) {
                Ok(metadata) => entries.push(BackupEntry {
                    id,
                    created_at: metadata.created_at,
                    operation_tag: metadata.operation,
                    file_count: metadata.files.len(),
                }),
                Err(e) => warn!(id = %id, error = %e, "skipping backup with unreadable metadata"),
            }
        }
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(entries)
    }

    /// Remove every backup whose `created_at` is older than `older_than_secs`
    /// seconds ago; returns the number removed.
    pub fn cleanup(&self, older_than_secs: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::seconds(older_than_secs);
        let mut removed = 0;
        for entry in self.list()? {
            let created_at = chrono::DateTime::parse_from_rfc3339(&entry.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(Utc::now());
            if created_at < cutoff {
                let dir = self.root.join(&entry.id);
                if std::fs::remove_dir_all(&dir).is_ok() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

/// Raw hex encoding, to avoid pulling in a dedicated crate for eight characters.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_restore_round_trips_bytes() {
        let project = tempdir().unwrap();
        let backups_root = tempdir().unwrap();
        let file = project.path().join("a.py");
        std::fs::write(&file, "original contents\n").unwrap();

        let store = BackupStore::new(backups_root.path());
        let backup_id = store
            .create(&[file.clone()], project.path(), "apply_deduplication")
            .unwrap();

        std::fs::write(&file, "mutated contents\n").unwrap();
        let report = store.restore(&backup_id).unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "original contents\n");
    }

    #[test]
    fn list_reports_operation_and_file_count() {
        let project = tempdir().unwrap();
        let backups_root = tempdir().unwrap();
        let file = project.path().join("a.py");
        std::fs::write(&file, "x\n").unwrap();

        let store = BackupStore::new(backups_root.path());
        store.create(&[file], project.path(), "enforce_fix").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].operation_tag, "enforce_fix");
        assert_eq!(listed[0].file_count, 1);
    }

    #[test]
    fn tampered_payload_is_flagged_on_restore() {
        let project = tempdir().unwrap();
        let backups_root = tempdir().unwrap();
        let file = project.path().join("a.py");
        std::fs::write(&file, "x\n").unwrap();

        let store = BackupStore::new(backups_root.path());
        let backup_id = store.create(&[file], project.path(), "enforce_fix").unwrap();

        let payload_file = backups_root.path().join(&backup_id).join("payload/a.py");
        std::fs::write(&payload_file, "tampered\n").unwrap();

        let report = store.restore(&backup_id).unwrap();
        assert_eq!(report.errors.len(), 1);
    }
}
