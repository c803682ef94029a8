use crate::fsio;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const SCRIPT_BACKUP: &str = "user.script.txt";
const ORDER_BACKUP: &str = "active_order.txt";
const BACKUP_PREFIX: &str = "backup-";
pub const BACKUPS_KEPT: usize = 20;

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupMeta {
    pub timestamp: u64,
    #[serde(default)]
    pub created: Option<String>,
    pub reason: Option<String>,
    pub game: String,
    #[serde(default)]
    pub has_script: bool,
    #[serde(default)]
    pub has_order: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct LastBackup {
    path: PathBuf,
    timestamp: u64,
}

/// What a restore did to one live file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RestoredFile {
    /// Overwritten with the backed-up copy.
    Written,
    /// Removed, since it did not exist when the backup was taken.
    Removed,
    /// Absent before and after.
    #[default]
    Absent,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Restored {
    pub script: RestoredFile,
    pub order: RestoredFile,
}

/// Copies the current script and order store into a fresh backup folder.
pub fn create_backup(
    data_dir: &Path,
    game_name: &str,
    script_path: &Path,
    order_path: &Path,
    reason: Option<&str>,
) -> Result<PathBuf> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let backup_root = data_dir.join("backups");
    fs::create_dir_all(&backup_root).context("create backups dir")?;
    let backup_dir = unused_dir(&backup_root, &format!("{BACKUP_PREFIX}{stamp}"));
    fs::create_dir_all(&backup_dir).context("create backup dir")?;

    let has_script = copy_if_present(script_path, &backup_dir.join(SCRIPT_BACKUP))
        .context("back up load-order script")?;
    let has_order = copy_if_present(order_path, &backup_dir.join(ORDER_BACKUP))
        .context("back up active order")?;

    let meta = BackupMeta {
        timestamp: stamp,
        created: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
        reason: reason.map(|value| value.to_string()),
        game: game_name.to_string(),
        has_script,
        has_order,
    };
    let meta_json = serde_json::to_string_pretty(&meta).context("serialize backup meta")?;
    fsio::write_atomic_text(&backup_dir.join("meta.json"), &meta_json)
        .context("write backup meta")?;

    let last = LastBackup {
        path: backup_dir.clone(),
        timestamp: stamp,
    };
    let last_json = serde_json::to_string_pretty(&last).context("serialize last backup")?;
    fsio::write_atomic_text(&backup_root.join("last.json"), &last_json)
        .context("write last backup")?;

    prune_backups(&backup_root, BACKUPS_KEPT).context("prune old backups")?;
    Ok(backup_dir)
}

pub fn load_last_backup(data_dir: &Path) -> Result<Option<PathBuf>> {
    let path = data_dir.join("backups").join("last.json");
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path).context("read last backup")?;
    let last: LastBackup = serde_json::from_str(&raw).context("parse last backup")?;
    if last.path.exists() {
        Ok(Some(last.path))
    } else {
        Ok(None)
    }
}

pub fn load_backup_meta(backup_dir: &Path) -> Result<BackupMeta> {
    let raw = fs::read_to_string(backup_dir.join("meta.json")).context("read backup meta")?;
    serde_json::from_str(&raw).context("parse backup meta")
}

/// Puts the live script and order back into the state the backup recorded.
/// A file that did not exist at backup time is removed.
pub fn restore_backup(backup_dir: &Path, script_path: &Path, order_path: &Path) -> Result<Restored> {
    let meta = load_backup_meta(backup_dir)?;
    let script = restore_file(meta.has_script, &backup_dir.join(SCRIPT_BACKUP), script_path)
        .context("restore load-order script")?;
    let order = restore_file(meta.has_order, &backup_dir.join(ORDER_BACKUP), order_path)
        .context("restore active order")?;
    Ok(Restored { script, order })
}

fn restore_file(backed_up: bool, copy: &Path, live: &Path) -> Result<RestoredFile> {
    if backed_up {
        let raw = fs::read(copy).with_context(|| format!("read {}", copy.display()))?;
        fsio::write_atomic(live, &raw)?;
        return Ok(RestoredFile::Written);
    }
    match fs::remove_file(live) {
        Ok(()) => Ok(RestoredFile::Removed),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(RestoredFile::Absent),
        Err(err) => Err(err).with_context(|| format!("remove {}", live.display())),
    }
}

fn copy_if_present(source: &Path, dest: &Path) -> Result<bool> {
    if !source.is_file() {
        return Ok(false);
    }
    let raw = fs::read(source).with_context(|| format!("read {}", source.display()))?;
    fsio::write_atomic(dest, &raw)?;
    Ok(true)
}

/// Deletes all but the newest `keep` backup folders. Folders not named by
/// `create_backup` are left alone.
fn prune_backups(backup_root: &Path, keep: usize) -> Result<()> {
    let mut backups: Vec<((u64, u64), PathBuf)> = fs::read_dir(backup_root)?
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let key = backup_sort_key(entry.file_name().to_str()?)?;
            Some((key, entry.path()))
        })
        .collect();
    if backups.len() <= keep {
        return Ok(());
    }
    backups.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, path) in backups.into_iter().skip(keep) {
        fs::remove_dir_all(&path).with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(())
}

/// `backup-<unix>` or `backup-<unix>-<n>` as `(unix, n)`.
fn backup_sort_key(name: &str) -> Option<(u64, u64)> {
    let rest = name.strip_prefix(BACKUP_PREFIX)?;
    match rest.split_once('-') {
        Some((stamp, suffix)) => Some((stamp.parse().ok()?, suffix.parse().ok()?)),
        None => Some((rest.parse().ok()?, 0)),
    }
}

fn unused_dir(root: &Path, name: &str) -> PathBuf {
    let mut candidate = root.join(name);
    let mut suffix = 1;
    while candidate.exists() {
        candidate = root.join(format!("{name}-{suffix}"));
        suffix += 1;
    }
    candidate
}
