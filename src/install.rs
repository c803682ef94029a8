use crate::{
    error::ManagerError,
    inventory::{has_extension, preview_path},
    warhammer2::{PACK_EXTENSION, PREVIEW_EXTENSION},
};
use anyhow::{Context, Result};
use blake3::Hasher;
use filetime::{set_file_mtime, FileTime};
use serde::Serialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use tempfile::NamedTempFile;
use time::{Date, Month, PrimitiveDateTime, Time as TimeOfDay};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// File names written into the content dir.
    pub installed: Vec<String>,
    /// File names left alone because they already existed.
    pub skipped: Vec<String>,
    pub unrecognized: bool,
}

impl InstallReport {
    fn unrecognized() -> Self {
        Self {
            unrecognized: true,
            ..Self::default()
        }
    }

    fn record_installed(&mut self, name: &str) {
        if !self.installed.iter().any(|entry| entry == name) {
            self.installed.push(name.to_string());
        }
    }

    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.installed
            .iter()
            .map(String::as_str)
            .filter(|name| has_extension(name, PACK_EXTENSION))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub removed: Vec<String>,
}

#[derive(Clone, Copy)]
enum SourceKind {
    Pack,
    Zip,
    SevenZip,
}

impl SourceKind {
    fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if has_extension(name, PACK_EXTENSION) {
            Some(SourceKind::Pack)
        } else if has_extension(name, "zip") {
            Some(SourceKind::Zip)
        } else if has_extension(name, "7z") {
            Some(SourceKind::SevenZip)
        } else {
            None
        }
    }
}

struct StagingGuard {
    path: PathBuf,
}

impl StagingGuard {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Installs a pack file or the packs inside an archive into `content_dir`.
///
/// A missing source installs nothing. `data_dir` hosts the staging area for
/// archive formats that must be unpacked to disk first.
pub fn install_path(source: &Path, content_dir: &Path, data_dir: &Path) -> Result<InstallReport> {
    if !source.exists() {
        return Ok(InstallReport::default());
    }
    if !source.is_file() {
        return Ok(InstallReport::unrecognized());
    }

    match SourceKind::detect(source) {
        Some(SourceKind::Pack) => install_pack_file(source, content_dir),
        Some(SourceKind::Zip) => install_zip(source, content_dir),
        Some(SourceKind::SevenZip) => install_7z(source, content_dir, data_dir),
        None => Ok(InstallReport::unrecognized()),
    }
}

/// Copies a pack and its preview, never replacing files already present.
fn install_pack_file(source: &Path, content_dir: &Path) -> Result<InstallReport> {
    fs::create_dir_all(content_dir).context("create content dir")?;
    let mut report = InstallReport::default();
    let name = file_name_str(source)?;

    copy_no_clobber(source, content_dir, &name, &mut report)?;

    let source_dir = source.parent().unwrap_or_else(|| Path::new("."));
    if let Some(preview) = preview_path(source_dir, &name).filter(|path| path.is_file()) {
        let preview_name = file_name_str(&preview)?;
        copy_no_clobber(&preview, content_dir, &preview_name, &mut report)?;
    }

    Ok(report)
}

fn copy_no_clobber(
    source: &Path,
    content_dir: &Path,
    name: &str,
    report: &mut InstallReport,
) -> Result<()> {
    let dest = content_dir.join(name);
    if dest.exists() {
        report.skipped.push(name.to_string());
        return Ok(());
    }

    let mut input = fs::File::open(source).with_context(|| format!("open {}", source.display()))?;
    let mut temp = NamedTempFile::new_in(content_dir).context("create install temp")?;
    io::copy(&mut input, &mut temp).with_context(|| format!("copy {name}"))?;
    match temp.persist_noclobber(&dest) {
        Ok(_) => {
            preserve_mtime(source, &dest);
            report.record_installed(name);
        }
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
            report.skipped.push(name.to_string());
        }
        Err(err) => return Err(err.error).with_context(|| format!("install {name}")),
    }
    Ok(())
}

/// Extracts pack and preview entries, flattened to their file names, in
/// archive order. A later entry with the same name replaces an earlier one.
fn install_zip(path: &Path, content_dir: &Path) -> Result<InstallReport> {
    let file = fs::File::open(path).context("open zip")?;
    let mut archive = zip::ZipArchive::new(file).context("read zip")?;
    fs::create_dir_all(content_dir).context("create content dir")?;
    let mut report = InstallReport::default();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("zip entry")?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = flattened_name(entry.name()) else {
            continue;
        };
        if !is_payload_name(&name) {
            continue;
        }

        let dest = content_dir.join(&name);
        let mut temp = NamedTempFile::new_in(content_dir).context("create install temp")?;
        io::copy(&mut entry, &mut temp).with_context(|| format!("extract {name}"))?;
        temp.persist(&dest)
            .map_err(|err| err.error)
            .with_context(|| format!("install {name}"))?;
        if let Some(mtime) = entry.last_modified().and_then(zip_time_to_unix) {
            let _ = set_file_mtime(&dest, FileTime::from_unix_time(mtime, 0));
        }
        report.record_installed(&name);
    }

    Ok(report)
}

/// 7z archives are unpacked into a staging dir first; matching files are then
/// applied in path order with the same replace rule as zip.
fn install_7z(path: &Path, content_dir: &Path, data_dir: &Path) -> Result<InstallReport> {
    let stage = make_temp_dir(data_dir, &hash_path(path))?;
    let _guard = StagingGuard::new(stage.clone());
    sevenz_rust::decompress_file(path, &stage)
        .with_context(|| format!("extract 7z archive {path:?}"))?;

    fs::create_dir_all(content_dir).context("create content dir")?;
    let mut report = InstallReport::default();
    let mut files: Vec<PathBuf> = WalkDir::new(&stage)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    for file in files {
        let Some(name) = file.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_payload_name(name) {
            continue;
        }
        let name = name.to_string();
        let dest = content_dir.join(&name);
        let mut input = fs::File::open(&file).context("open staged file")?;
        let mut temp = NamedTempFile::new_in(content_dir).context("create install temp")?;
        io::copy(&mut input, &mut temp).with_context(|| format!("copy {name}"))?;
        temp.persist(&dest)
            .map_err(|err| err.error)
            .with_context(|| format!("install {name}"))?;
        preserve_mtime(&file, &dest);
        report.record_installed(&name);
    }

    Ok(report)
}

/// Removes a pack and its preview. Files already gone are not an error.
pub fn delete_package(id: &str, content_dir: &Path) -> Result<DeleteReport> {
    if flattened_name(id).as_deref() != Some(id) {
        return Err(ManagerError::UnknownPackage(id.to_string()).into());
    }

    let mut report = DeleteReport::default();
    let mut targets = vec![content_dir.join(id)];
    if let Some(preview) = preview_path(content_dir, id) {
        targets.push(preview);
    }

    for target in targets {
        match fs::remove_file(&target) {
            Ok(()) => {
                if let Some(name) = target.file_name().and_then(|name| name.to_str()) {
                    report.removed.push(name.to_string());
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("remove {}", target.display()));
            }
        }
    }

    Ok(report)
}

/// Last path component of an archive entry name, `None` for names that do
/// not denote a plain file.
fn flattened_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

fn is_payload_name(name: &str) -> bool {
    has_extension(name, PACK_EXTENSION) || has_extension(name, PREVIEW_EXTENSION)
}

fn file_name_str(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("file name of {}", path.display()))
}

fn zip_time_to_unix(dt: zip::DateTime) -> Option<i64> {
    let month = Month::try_from(dt.month()).ok()?;
    let date = Date::from_calendar_date(dt.year() as i32, month, dt.day()).ok()?;
    let time = TimeOfDay::from_hms(dt.hour(), dt.minute(), dt.second()).ok()?;
    let datetime = PrimitiveDateTime::new(date, time).assume_utc();
    Some(datetime.unix_timestamp())
}

fn preserve_mtime(source: &Path, dest: &Path) {
    let Ok(meta) = fs::metadata(source) else {
        return;
    };
    let Ok(modified) = meta.modified() else {
        return;
    };
    let Ok(duration) = modified.duration_since(UNIX_EPOCH) else {
        return;
    };
    let mtime = FileTime::from_unix_time(duration.as_secs() as i64, 0);
    let _ = set_file_mtime(dest, mtime);
}

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir(data_dir: &Path, suffix: &str) -> Result<PathBuf> {
    let temp_root = data_dir.join("tmp");
    fs::create_dir_all(&temp_root).context("create temp root")?;

    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_dir = temp_root.join(format!("install-{nanos}-{counter}-{suffix}"));
    fs::create_dir_all(&temp_dir).context("create temp dir")?;
    Ok(temp_dir)
}

fn hash_path(path: &Path) -> String {
    let mut hasher = Hasher::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let hash = hasher.finalize();
    hash.to_hex()[..16].to_string()
}
