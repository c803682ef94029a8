use crate::{fsio, script, standard::StandardRegistry};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

pub const ORDER_FILE_NAME: &str = "active_order.txt";

/// Desired activation sequence. Never holds the same id twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActiveOrder {
    ids: Vec<String>,
}

impl ActiveOrder {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut order = Self::default();
        for id in ids {
            order.activate(id);
        }
        order
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|entry| entry == id)
    }

    /// Appends `id` unless already active. Returns whether it was added.
    pub fn activate(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Removes `id`. Returns whether it was active.
    pub fn deactivate(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|entry| entry != id);
        self.ids.len() != before
    }

    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.ids.len() {
            return false;
        }
        self.ids.swap(index, index - 1);
        true
    }

    pub fn move_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.ids.len() {
            return false;
        }
        self.ids.swap(index, index + 1);
        true
    }

    /// Drops ids not in `installed`, returning them in their former order.
    pub fn prune(&mut self, installed: &HashSet<String>) -> Vec<String> {
        let (kept, removed): (Vec<String>, Vec<String>) = std::mem::take(&mut self.ids)
            .into_iter()
            .partition(|id| installed.contains(id));
        self.ids = kept;
        removed
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for id in &self.ids {
            out.push_str(id);
            out.push('\n');
        }
        out
    }
}

/// Plain-text store of the active order, one id per line.
#[derive(Debug, Clone)]
pub struct ActiveOrderStore {
    path: PathBuf,
}

impl ActiveOrderStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(ORDER_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the order, bootstrapping it from the script's declarations when
    /// the store file is missing, and drops ids that are no longer installed.
    /// Any change made here is written back before returning.
    pub fn read(
        &self,
        script_lines: &[String],
        registry: &StandardRegistry,
        installed: &HashSet<String>,
    ) -> Result<ActiveOrder> {
        let (mut order, mut dirty) = match self.read_raw()? {
            Some(raw) => {
                let order = ActiveOrder::new(raw.iter().cloned());
                let deduped = order.len() != raw.len();
                (order, deduped)
            }
            None => (
                ActiveOrder::new(script::declared_mods(script_lines, registry)),
                true,
            ),
        };

        if !order.prune(installed).is_empty() {
            dirty = true;
        }
        if dirty {
            self.write(&order)?;
        }
        Ok(order)
    }

    /// Stored ids as written, blank lines skipped. `None` when there is no
    /// store file yet.
    pub fn read_raw(&self) -> Result<Option<Vec<String>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read active order {}", self.path.display()))?;
        let ids = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Some(ids))
    }

    pub fn write(&self, order: &ActiveOrder) -> Result<()> {
        fsio::write_atomic_text(&self.path, &order.render()).context("write active order")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn installed(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn activate_is_deduplicated() {
        let mut order = ActiveOrder::new(["a", "b", "a"]);
        assert_eq!(order.ids(), ["a", "b"]);
        assert!(!order.activate("b"));
        assert!(order.activate("c"));
        assert!(order.deactivate("a"));
        assert!(!order.deactivate("a"));
        assert_eq!(order.ids(), ["b", "c"]);
    }

    #[test]
    fn moves_stay_in_bounds() {
        let mut order = ActiveOrder::new(["a", "b", "c"]);
        assert!(!order.move_up(0));
        assert!(!order.move_down(2));
        assert!(order.move_up(2));
        assert_eq!(order.ids(), ["a", "c", "b"]);
        assert!(order.move_down(0));
        assert_eq!(order.ids(), ["c", "a", "b"]);
    }

    #[test]
    fn bootstrap_from_script() {
        let dir = tempfile::tempdir().unwrap();
        let store = ActiveOrderStore::in_dir(dir.path());
        let registry: StandardRegistry = ["std"].into_iter().collect();
        let script = lines(&["mod \"x\";", "mod \"std\";"]);

        let order = store.read(&script, &registry, &installed(&["x"])).unwrap();

        assert_eq!(order.ids(), ["x"]);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "x\n");
    }

    #[test]
    fn existing_store_wins_over_script() {
        let dir = tempfile::tempdir().unwrap();
        let store = ActiveOrderStore::in_dir(dir.path());
        fs::write(store.path(), "b\n\na\n").unwrap();
        let script = lines(&["mod \"a\";", "mod \"c\";"]);

        let order = store
            .read(&script, &StandardRegistry::default(), &installed(&["a", "b", "c"]))
            .unwrap();

        assert_eq!(order.ids(), ["b", "a"]);
    }

    #[test]
    fn prunes_missing_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = ActiveOrderStore::in_dir(dir.path());
        fs::write(store.path(), "a\ngone\nb\n").unwrap();
        let registry = StandardRegistry::default();

        let order = store.read(&[], &registry, &installed(&["a", "b"])).unwrap();

        assert_eq!(order.ids(), ["a", "b"]);
        assert_eq!(
            store.read_raw().unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn clean_read_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = ActiveOrderStore::in_dir(dir.path());
        fs::write(store.path(), "a\r\n\r\nb\r\n").unwrap();

        let order = store
            .read(&[], &StandardRegistry::default(), &installed(&["a", "b"]))
            .unwrap();

        assert_eq!(order.ids(), ["a", "b"]);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "a\r\n\r\nb\r\n");
    }
}
