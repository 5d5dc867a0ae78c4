//! Safe in-place mountlist update
//!
//! The mountlist is rewritten through a staged copy in the same directory:
//!
//! 1. stream `cloud.mountlist` through the transformer into `.cloud.mountlist.tmp`
//! 2. rename `cloud.mountlist` to `cloud.mountlist.bak`
//! 3. rename the staged copy over `cloud.mountlist`
//! 4. drop the backup, or rename it back if step 3 failed
//!
//! At any point the mountlist holds either its old or its new content in full.
//! All three paths must live on one volume so the renames stay metadata-only.

use crate::detect;
use crate::disk_space::{self, DiskSpaceInfo, SpaceCheck};
use crate::error_helpers::{hint_for, is_not_found};
use crate::preview::{self, Preview};
use crate::sink::LogSink;
use crate::transform::{RawLines, ReplacementTable};
use crate::variant::Variant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// The three paths one transaction works with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPaths {
    /// The mountlist itself
    pub target: PathBuf,
    /// Staged copy, hidden sibling of the target
    pub staging: PathBuf,
    /// Previous content while the replacement is in flight
    pub backup: PathBuf,
}

impl TransactionPaths {
    pub fn for_target(target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mountlist".to_string());
        let dir = target.parent().map(Path::to_path_buf).unwrap_or_default();

        Self {
            staging: dir.join(format!(".{}.tmp", name)),
            backup: dir.join(format!("{}.bak", name)),
            target,
        }
    }

    /// Directory holding all three paths
    pub fn dir(&self) -> &Path {
        match self.target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }
}

/// What to do with a backup left behind by an interrupted earlier run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleBackupPolicy {
    /// Log the anomaly and delete the stale file; the current mountlist is known good
    #[default]
    Clear,
    /// Refuse to start and leave the stale file for inspection
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    pub stale_backup: StaleBackupPolicy,
    /// Refuse to stage when the volume has less free space than the mountlist size
    pub check_disk_space: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            stale_backup: StaleBackupPolicy::Clear,
            check_disk_space: true,
        }
    }
}

/// Filesystem primitives used by a transaction
///
/// The defaults go straight to `std::fs`. Tests swap in implementations that
/// fail specific steps.
pub trait FileOps {
    fn open_read(&self, path: &Path) -> io::Result<File> {
        File::open(path)
    }

    fn create(&self, path: &Path) -> io::Result<File> {
        File::create(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    /// Free-space preflight for the directory the staged copy goes into
    fn check_room(&self, dir: &Path, required: u64) -> SpaceCheck {
        disk_space::check_room(dir, required)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileOps;

impl FileOps for StdFileOps {}

/// Non-fatal anomalies seen during a transaction
#[derive(Debug)]
pub enum ApplyWarning {
    /// A stale backup was found and deleted before starting
    StaleBackupCleared,
    /// A stale backup was found but could not be deleted
    StaleBackupNotRemoved(io::Error),
    /// The mountlist disappeared between reading it and backing it up
    TargetVanished,
    /// Renaming the mountlist to its backup failed; the replacement went ahead without one
    BackupRenameFailed(io::Error),
    /// The replacement succeeded but the backup could not be deleted
    BackupNotRemoved(io::Error),
    /// The staged copy could not be deleted after a failure
    StagingNotRemoved(io::Error),
}

impl fmt::Display for ApplyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyWarning::StaleBackupCleared => write!(f, "stale backup removed"),
            ApplyWarning::StaleBackupNotRemoved(e) => write!(f, "stale backup kept: {}", e),
            ApplyWarning::TargetVanished => write!(f, "mountlist vanished before backup"),
            ApplyWarning::BackupRenameFailed(e) => write!(f, "backup rename failed: {}", e),
            ApplyWarning::BackupNotRemoved(e) => write!(f, "backup not removed: {}", e),
            ApplyWarning::StagingNotRemoved(e) => write!(f, "staged copy not removed: {}", e),
        }
    }
}

/// What happened to the previous content after a failed replacement
#[derive(Debug)]
pub enum Rollback {
    /// The backup was renamed back over the mountlist
    Restored,
    /// No backup was taken by this transaction, so nothing was restored
    NoBackupToRestore,
    /// The backup exists but could not be renamed back; it is left in place
    RestoreFailed(io::Error),
}

impl fmt::Display for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rollback::Restored => write!(f, "previous mountlist restored"),
            Rollback::NoBackupToRestore => write!(f, "no backup to restore"),
            Rollback::RestoreFailed(e) => write!(f, "restore failed: {}", e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MountlistError {
    #[error("mountlist not found at {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("cannot read mountlist {}: {source}", path.display())]
    SourceUnreadable { path: PathBuf, source: io::Error },

    #[error("cannot stage {}: {source}", path.display())]
    StagingWriteFailed { path: PathBuf, source: io::Error },

    #[error("stale backup {} left by an earlier run", path.display())]
    StaleBackup { path: PathBuf },

    #[error("cannot replace {} (IoErr={}): {source}; {rollback}", path.display(), io_code(source))]
    ReplaceFailed {
        path: PathBuf,
        source: io::Error,
        rollback: Rollback,
        warnings: Vec<ApplyWarning>,
    },
}

impl MountlistError {
    /// Underlying OS error code, when the failure came from the OS
    pub fn os_code(&self) -> Option<i32> {
        match self {
            MountlistError::SourceMissing { .. } | MountlistError::StaleBackup { .. } => None,
            MountlistError::SourceUnreadable { source, .. }
            | MountlistError::StagingWriteFailed { source, .. }
            | MountlistError::ReplaceFailed { source, .. } => source.raw_os_error(),
        }
    }
}

/// Successful transaction summary
#[derive(Debug)]
pub struct Applied {
    pub variant: Variant,
    /// Lines in the rewritten mountlist
    pub lines: usize,
    /// Handler declarations rewritten
    pub rewritten: usize,
    pub warnings: Vec<ApplyWarning>,
}

/// `IoErr=` value for log lines: the OS code when there is one
pub fn io_code(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => code.to_string(),
        None => format!("{:?}", err.kind()),
    }
}

enum StageError {
    Read(io::Error),
    Write(io::Error),
}

/// Handle on one mountlist file
#[derive(Debug, Clone)]
pub struct Mountlist<F = StdFileOps> {
    paths: TransactionPaths,
    options: UpdateOptions,
    ops: F,
}

impl Mountlist<StdFileOps> {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            paths: TransactionPaths::for_target(target),
            options: UpdateOptions::default(),
            ops: StdFileOps,
        }
    }
}

impl<F: FileOps> Mountlist<F> {
    pub fn with_options(mut self, options: UpdateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_file_ops<G: FileOps>(self, ops: G) -> Mountlist<G> {
        Mountlist {
            paths: self.paths,
            options: self.options,
            ops,
        }
    }

    pub fn paths(&self) -> &TransactionPaths {
        &self.paths
    }

    pub fn path(&self) -> &Path {
        &self.paths.target
    }

    /// Variant the mountlist currently selects; 68k when it cannot be read
    pub fn detect_variant(&self) -> Variant {
        detect::detect_variant(&self.paths.target)
    }

    /// Lines that `apply_variant` would change, without writing anything
    pub fn preview(&self, variant: Variant) -> Result<Preview, MountlistError> {
        let content = match fs::read(&self.paths.target) {
            Ok(content) => content,
            Err(e) if is_not_found(&e) => {
                return Err(MountlistError::SourceMissing {
                    path: self.paths.target.clone(),
                });
            }
            Err(source) => {
                return Err(MountlistError::SourceUnreadable {
                    path: self.paths.target.clone(),
                    source,
                });
            }
        };
        Ok(preview::plan(&content, variant))
    }

    /// Rewrite the mountlist to reference the `variant` handler builds
    pub fn apply_variant(
        &self,
        variant: Variant,
        sink: &dyn LogSink,
    ) -> Result<Applied, MountlistError> {
        let paths = &self.paths;
        info!(path = %paths.target.display(), %variant, "Applying handler variant");

        let input = match self.ops.open_read(&paths.target) {
            Ok(file) => file,
            Err(e) if is_not_found(&e) => {
                sink.line(&format!("[Mountlist] not found at {}", paths.target.display()));
                warn!(path = %paths.target.display(), "Mountlist missing, nothing to update");
                if self.ops.exists(&paths.backup) {
                    sink.line(&format!(
                        "[Mountlist] WARNING: backup from an interrupted update at {}; rename it back to {}",
                        paths.backup.display(),
                        paths.target.display()
                    ));
                    warn!(backup = %paths.backup.display(), "Only the backup of the mountlist is left");
                }
                return Err(MountlistError::SourceMissing {
                    path: paths.target.clone(),
                });
            }
            Err(source) => {
                sink.line(&format!("[Mountlist] ERROR: open (IoErr={})", io_code(&source)));
                error!(path = %paths.target.display(), error = %source, "Cannot open mountlist");
                return Err(MountlistError::SourceUnreadable {
                    path: paths.target.clone(),
                    source,
                });
            }
        };

        if self.options.check_disk_space {
            let required = input.metadata().map(|m| m.len()).unwrap_or(0);
            match self.ops.check_room(paths.dir(), required) {
                SpaceCheck::Enough => {}
                SpaceCheck::Short { available, required } => {
                    sink.line(&format!(
                        "[Mountlist] ERROR: not enough space ({} free, {} needed)",
                        DiskSpaceInfo::bytes_to_human(available),
                        DiskSpaceInfo::bytes_to_human(required)
                    ));
                    error!(available, required, "Not enough free space to stage mountlist");
                    return Err(MountlistError::StagingWriteFailed {
                        path: paths.staging.clone(),
                        source: io::Error::new(
                            io::ErrorKind::StorageFull,
                            format!("{} bytes free, {} needed", available, required),
                        ),
                    });
                }
                SpaceCheck::Unknown(reason) => {
                    debug!(%reason, "Skipping free space check");
                }
            }
        }

        let mut warnings = Vec::new();
        if self.ops.exists(&paths.backup) {
            match self.options.stale_backup {
                StaleBackupPolicy::Abort => {
                    sink.line(&format!(
                        "[Mountlist] ERROR: stale backup at {}; remove it and retry",
                        paths.backup.display()
                    ));
                    warn!(path = %paths.backup.display(), "Stale backup present, refusing to start");
                    return Err(MountlistError::StaleBackup {
                        path: paths.backup.clone(),
                    });
                }
                StaleBackupPolicy::Clear => match self.ops.remove(&paths.backup) {
                    Ok(()) => {
                        sink.line("[Mountlist] WARNING: stale backup removed");
                        warn!(path = %paths.backup.display(), "Removed stale backup from an earlier run");
                        warnings.push(ApplyWarning::StaleBackupCleared);
                    }
                    Err(e) => {
                        sink.line(&format!(
                            "[Mountlist] WARNING: stale backup kept (IoErr={})",
                            io_code(&e)
                        ));
                        warn!(path = %paths.backup.display(), error = %e, "Cannot remove stale backup");
                        warnings.push(ApplyWarning::StaleBackupNotRemoved(e));
                    }
                },
            }
        }

        let (lines, rewritten) = match self.stage(input, variant) {
            Ok(counts) => counts,
            Err(StageError::Read(source)) => {
                sink.line(&format!("[Mountlist] ERROR: read (IoErr={})", io_code(&source)));
                error!(path = %paths.target.display(), error = %source, "Failed reading mountlist");
                self.discard_staging(sink);
                return Err(MountlistError::SourceUnreadable {
                    path: paths.target.clone(),
                    source,
                });
            }
            Err(StageError::Write(source)) => {
                let mut line = format!("[Mountlist] ERROR: open tmp (IoErr={})", io_code(&source));
                if let Some(hint) = hint_for(&source, &paths.staging) {
                    line.push_str(&format!("; {}", hint));
                }
                sink.line(&line);
                error!(path = %paths.staging.display(), error = %source, "Failed staging mountlist");
                self.discard_staging(sink);
                return Err(MountlistError::StagingWriteFailed {
                    path: paths.staging.clone(),
                    source,
                });
            }
        };
        debug!(lines, rewritten, path = %paths.staging.display(), "Staged mountlist");

        let mut backup_taken = false;
        if self.ops.exists(&paths.target) {
            match self.ops.rename(&paths.target, &paths.backup) {
                Ok(()) => backup_taken = true,
                Err(e) => {
                    sink.line(&format!(
                        "[Mountlist] WARNING: backup rename failed (IoErr={})",
                        io_code(&e)
                    ));
                    warn!(error = %e, "Continuing without backup");
                    warnings.push(ApplyWarning::BackupRenameFailed(e));
                }
            }
        } else {
            sink.line("[Mountlist] WARNING: mountlist vanished before backup");
            warn!(path = %paths.target.display(), "Mountlist disappeared while staging");
            warnings.push(ApplyWarning::TargetVanished);
        }

        if let Err(source) = self.ops.rename(&paths.staging, &paths.target) {
            sink.line(&format!("[Mountlist] ERROR: replace (IoErr={})", io_code(&source)));
            error!(path = %paths.target.display(), error = %source, "Replacing mountlist failed");

            let rollback = self.roll_back(backup_taken, sink);
            if let Some(e) = self.discard_staging(sink) {
                warnings.push(ApplyWarning::StagingNotRemoved(e));
            }

            return Err(MountlistError::ReplaceFailed {
                path: paths.target.clone(),
                source,
                rollback,
                warnings,
            });
        }

        if backup_taken {
            if let Err(e) = self.ops.remove(&paths.backup) {
                sink.line(&format!(
                    "[Mountlist] WARNING: backup not removed (IoErr={})",
                    io_code(&e)
                ));
                warn!(path = %paths.backup.display(), error = %e, "Cannot remove backup");
                warnings.push(ApplyWarning::BackupNotRemoved(e));
            }
        }

        sink.line("[Mountlist] variant applied");
        info!(%variant, lines, rewritten, "Mountlist updated");

        Ok(Applied {
            variant,
            lines,
            rewritten,
            warnings,
        })
    }

    fn stage(&self, input: File, variant: Variant) -> Result<(usize, usize), StageError> {
        let output = self
            .ops
            .create(&self.paths.staging)
            .map_err(StageError::Write)?;
        let table = ReplacementTable::for_variant(variant);
        let mut writer = BufWriter::new(output);
        let mut lines = 0;
        let mut rewritten = 0;

        for line in RawLines::new(BufReader::new(input)) {
            let line = line.map_err(StageError::Read)?;
            let out = match table.replacement_for(&line) {
                Some(replacement) => {
                    rewritten += 1;
                    replacement
                }
                None => line.as_slice(),
            };
            writer.write_all(out).map_err(StageError::Write)?;
            lines += 1;
        }

        let output = writer
            .into_inner()
            .map_err(|e| StageError::Write(e.into_error()))?;
        output.sync_all().map_err(StageError::Write)?;

        Ok((lines, rewritten))
    }

    fn roll_back(&self, backup_taken: bool, sink: &dyn LogSink) -> Rollback {
        let paths = &self.paths;
        if !backup_taken || !self.ops.exists(&paths.backup) {
            sink.line("[Mountlist] WARNING: no backup to restore");
            warn!(path = %paths.target.display(), "No backup to restore");
            return Rollback::NoBackupToRestore;
        }

        match self.ops.rename(&paths.backup, &paths.target) {
            Ok(()) => {
                sink.line("[Mountlist] previous mountlist restored");
                info!(path = %paths.target.display(), "Rolled back to previous mountlist");
                Rollback::Restored
            }
            Err(e) => {
                sink.line(&format!(
                    "[Mountlist] ERROR: restore failed (IoErr={}); previous mountlist kept at {}",
                    io_code(&e),
                    paths.backup.display()
                ));
                error!(backup = %paths.backup.display(), error = %e, "Rollback failed");
                Rollback::RestoreFailed(e)
            }
        }
    }

    /// Remove the staged copy; returns the error when it is still there
    fn discard_staging(&self, sink: &dyn LogSink) -> Option<io::Error> {
        match self.ops.remove(&self.paths.staging) {
            Ok(()) => None,
            Err(e) if is_not_found(&e) => None,
            Err(e) => {
                sink.line(&format!(
                    "[Mountlist] WARNING: cannot delete {} (IoErr={})",
                    self.paths.staging.display(),
                    io_code(&e)
                ));
                warn!(path = %self.paths.staging.display(), error = %e, "Staged copy left behind");
                Some(e)
            }
        }
    }
}
