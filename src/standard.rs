use anyhow::{Context, Result};
use std::{
    collections::HashSet,
    fs,
    path::Path,
};

/// Packages shipped with the game. They are never listed as mods and their
/// script declarations are never touched.
#[derive(Debug, Clone, Default)]
pub struct StandardRegistry {
    names: HashSet<String>,
}

impl StandardRegistry {
    /// Reads one package file name per line. A missing list yields an empty
    /// registry.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read standard pack list {}", path.display()))?;
        Ok(Self::parse(&raw))
    }

    pub fn parse(raw: &str) -> Self {
        let names = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.names.contains(id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for StandardRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}
