use anyhow::{Context, Result};
use std::{fs, io::Write, path::Path};
use tempfile::NamedTempFile;

/// Replaces `path` with `contents` via a temp file in the same directory.
///
/// The temp file is removed on drop if anything fails before the rename, so
/// the target is either untouched or fully replaced.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;

    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    temp.write_all(contents)
        .with_context(|| format!("write temp for {}", path.display()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("flush temp for {}", path.display()))?;
    temp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

pub fn write_atomic_text(path: &Path, contents: &str) -> Result<()> {
    write_atomic(path, contents.as_bytes())
}
