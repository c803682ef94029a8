use crate::{
    standard::StandardRegistry,
    warhammer2::{PACK_EXTENSION, PREVIEW_EXTENSION},
};
use serde::Serialize;
use std::{
    cmp::Ordering,
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub id: String,
    pub preview: Option<PathBuf>,
    pub is_standard: bool,
}

/// Installed mod packages in `content_dir`, standard packages excluded,
/// sorted case-insensitively by file name.
pub fn scan(content_dir: &Path, registry: &StandardRegistry) -> Vec<Package> {
    scan_all(content_dir, registry)
        .into_iter()
        .filter(|package| !package.is_standard)
        .collect()
}

/// Like [`scan`], but keeps standard packages with `is_standard` set.
pub fn scan_all(content_dir: &Path, registry: &StandardRegistry) -> Vec<Package> {
    let mut packages = Vec::new();
    let Ok(dir_entries) = fs::read_dir(content_dir) else {
        return packages;
    };

    for entry in dir_entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !has_extension(name, PACK_EXTENSION) {
            continue;
        }
        let preview = preview_path(content_dir, name).filter(|preview| preview.is_file());
        packages.push(Package {
            id: name.to_string(),
            preview,
            is_standard: registry.contains(name),
        });
    }

    packages.sort_by(|a, b| compare_ids(&a.id, &b.id));
    packages
}

pub fn installed_ids(packages: &[Package]) -> HashSet<String> {
    packages.iter().map(|package| package.id.clone()).collect()
}

pub fn compare_ids(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// `name` ends in `.<ext>`, ignoring ASCII case.
pub fn has_extension(name: &str, ext: &str) -> bool {
    let suffix_len = ext.len() + 1;
    if name.len() <= suffix_len {
        return false;
    }
    let Some(suffix) = name.get(name.len() - suffix_len..) else {
        return false;
    };
    suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(ext)
}

/// Sibling preview image for a package file name.
pub fn preview_path(content_dir: &Path, package_name: &str) -> Option<PathBuf> {
    let stem = package_stem(package_name)?;
    Some(content_dir.join(format!("{stem}.{PREVIEW_EXTENSION}")))
}

fn package_stem(package_name: &str) -> Option<&str> {
    if !has_extension(package_name, PACK_EXTENSION) {
        return None;
    }
    package_name.get(..package_name.len() - PACK_EXTENSION.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    fn ids(packages: &[Package]) -> Vec<&str> {
        packages.iter().map(|package| package.id.as_str()).collect()
    }

    #[test]
    fn missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let packages = scan(&dir.path().join("data"), &StandardRegistry::default());
        assert!(packages.is_empty());
    }

    #[test]
    fn sorts_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["beta.pack", "Alpha.pack", "gamma.PACK", "notes.txt"] {
            touch(dir.path(), name);
        }

        let packages = scan(dir.path(), &StandardRegistry::default());

        assert_eq!(ids(&packages), vec!["Alpha.pack", "beta.pack", "gamma.PACK"]);
    }

    #[test]
    fn filters_standard_packages() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "data.pack");
        touch(dir.path(), "my_mod.pack");
        let registry: StandardRegistry = ["data.pack"].into_iter().collect();

        assert_eq!(ids(&scan(dir.path(), &registry)), vec!["my_mod.pack"]);

        let all = scan_all(dir.path(), &registry);
        assert_eq!(ids(&all), vec!["data.pack", "my_mod.pack"]);
        assert!(all[0].is_standard);
        assert!(!all[1].is_standard);
    }

    #[test]
    fn pairs_preview_when_present() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.pack");
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.pack");

        let packages = scan(dir.path(), &StandardRegistry::default());

        assert_eq!(packages[0].preview, Some(dir.path().join("a.png")));
        assert_eq!(packages[1].preview, None);
    }

    #[test]
    fn ignores_directories_named_like_packs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("folder.pack")).unwrap();
        assert!(scan(dir.path(), &StandardRegistry::default()).is_empty());
    }

    #[test]
    fn extension_check() {
        assert!(has_extension("a.pack", "pack"));
        assert!(has_extension("A.PaCk", "pack"));
        assert!(!has_extension(".pack", "pack"));
        assert!(!has_extension("apack", "pack"));
        assert!(!has_extension("a.pack.bak", "pack"));
    }
}
