use crate::{
    backup::{self, Restored},
    config::{AppConfig, GameConfig},
    error::ManagerError,
    game::GameId,
    install::{self, DeleteReport, InstallReport},
    inventory::{self, Package},
    order::{ActiveOrder, ActiveOrderStore},
    script,
    standard::StandardRegistry,
    warhammer2::{self, GamePaths},
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    process::Command,
};

const LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// One installed package as the front end shows it.
#[derive(Debug, Clone, Serialize)]
pub struct PackageStatus {
    pub id: String,
    pub active: bool,
    pub position: Option<usize>,
    pub preview: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveReport {
    pub script_path: PathBuf,
    pub active: usize,
    pub backup: Option<PathBuf>,
}

/// Mutable state of one manager session. Front ends hold a `Session` and
/// call one operation per user action.
pub struct Session {
    pub app_config: AppConfig,
    pub game_id: GameId,
    pub config: GameConfig,
    pub paths: Option<GamePaths>,
    pub registry: StandardRegistry,
    pub packages: Vec<Package>,
    pub order: ActiveOrder,
    pub logs: Vec<LogEntry>,
    store: ActiveOrderStore,
    log_path: PathBuf,
    echo_logs: bool,
}

impl Session {
    pub fn initialize() -> Result<Self> {
        let app_config = AppConfig::load_or_create()?;
        let config = GameConfig::load_or_create(app_config.active_game)?;
        Self::open(app_config, config)
    }

    /// Opens a session on an already loaded configuration.
    pub fn open(app_config: AppConfig, config: GameConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir).context("create data dir")?;
        let game_id = config.game_id;
        let store = ActiveOrderStore::in_dir(&config.data_dir);
        let log_path = config.log_path();

        let mut session = Self {
            app_config,
            game_id,
            config,
            paths: None,
            registry: StandardRegistry::default(),
            packages: Vec::new(),
            order: ActiveOrder::default(),
            logs: Vec::new(),
            store,
            log_path,
            echo_logs: false,
        };
        session.detect_paths();
        session.refresh()?;
        Ok(session)
    }

    pub fn set_echo_logs(&mut self, echo: bool) {
        self.echo_logs = echo;
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    fn detect_paths(&mut self) {
        match warhammer2::detect_paths(
            self.config.game_root_override(),
            self.config.script_override(),
        ) {
            Ok(paths) => {
                self.log_info(format!("Game root: {}", paths.game_root.display()));
                self.paths = Some(paths);
            }
            Err(err) => {
                self.log_warn(format!("Path detection failed: {err:#}"));
                self.paths = None;
            }
        }
    }

    fn require_paths(&self) -> Result<GamePaths> {
        self.paths
            .clone()
            .ok_or_else(|| ManagerError::GameRootNotSet.into())
    }

    /// Re-reads the registry, the inventory and the active order from disk.
    pub fn refresh(&mut self) -> Result<()> {
        self.registry = StandardRegistry::load(&self.config.standard_list_path())?;

        let Some(paths) = self.paths.clone() else {
            // Without an inventory nothing can be pruned; keep the stored order.
            self.packages.clear();
            let raw = self.store.read_raw()?.unwrap_or_default();
            self.order = ActiveOrder::new(raw);
            return Ok(());
        };

        self.packages = inventory::scan(&paths.content_dir, &self.registry);
        let script = script::read_script(&paths.script_path)?;
        let bootstrapping = !self.store.exists();
        let installed = inventory::installed_ids(&self.packages);
        self.order = self.store.read(&script.lines, &self.registry, &installed)?;
        if bootstrapping {
            self.log_info(format!(
                "Active order created from {} ({} mod(s))",
                paths.script_path.display(),
                self.order.len()
            ));
        }
        Ok(())
    }

    pub fn statuses(&self) -> Vec<PackageStatus> {
        self.packages
            .iter()
            .map(|package| {
                let position = self.order.position(&package.id);
                PackageStatus {
                    id: package.id.clone(),
                    active: position.is_some(),
                    position: position.map(|index| index + 1),
                    preview: package.preview.clone(),
                }
            })
            .collect()
    }

    fn is_installed(&self, id: &str) -> bool {
        self.packages.iter().any(|package| package.id == id)
    }

    pub fn activate(&mut self, id: &str) -> Result<bool> {
        if !self.is_installed(id) {
            return Err(ManagerError::UnknownPackage(id.to_string()).into());
        }
        if !script::is_declarable(id) {
            self.log_warn(format!("Refused to activate {id:?}: name breaks the script"));
            return Err(ManagerError::UndeclarableName(id.to_string()).into());
        }
        if !self.order.activate(id) {
            return Ok(false);
        }
        self.store.write(&self.order)?;
        self.log_info(format!("Activated {id}"));
        Ok(true)
    }

    pub fn deactivate(&mut self, id: &str) -> Result<bool> {
        if !self.order.deactivate(id) {
            self.log_warn(format!("{id} was not active"));
            return Ok(false);
        }
        self.store.write(&self.order)?;
        self.log_info(format!("Deactivated {id}"));
        Ok(true)
    }

    pub fn move_package(&mut self, id: &str, direction: MoveDirection) -> Result<bool> {
        let index = self
            .order
            .position(id)
            .ok_or_else(|| ManagerError::NotActive(id.to_string()))?;
        let moved = match direction {
            MoveDirection::Up => self.order.move_up(index),
            MoveDirection::Down => self.order.move_down(index),
        };
        if moved {
            self.store.write(&self.order)?;
        }
        Ok(moved)
    }

    /// Rewrites the game's script from the active order.
    pub fn save(&mut self) -> Result<SaveReport> {
        let report = self.write_script("save")?;
        self.log_info(format!(
            "Saved {} active mod(s) to {}",
            report.active,
            report.script_path.display()
        ));
        Ok(report)
    }

    fn write_script(&mut self, reason: &str) -> Result<SaveReport> {
        let paths = self.require_paths()?;
        let current = script::read_script(&paths.script_path)?;
        let backup = backup::create_backup(
            &self.config.data_dir,
            &self.config.game_name,
            &paths.script_path,
            self.store.path(),
            Some(reason),
        )?;
        let lines = script::reconcile(&current.lines, self.order.ids(), &self.registry);
        script::write_script(&paths.script_path, &current.with_lines(lines))?;
        Ok(SaveReport {
            script_path: paths.script_path,
            active: self.order.len(),
            backup: Some(backup),
        })
    }

    /// Installs each source into the content dir. The active order is left
    /// alone; new packages start inactive.
    pub fn install(&mut self, sources: &[PathBuf]) -> Result<Vec<(PathBuf, InstallReport)>> {
        let paths = self.require_paths()?;
        let mut reports = Vec::new();
        for source in sources {
            let report = install::install_path(source, &paths.content_dir, &self.config.data_dir)
                .with_context(|| format!("install {}", source.display()))?;
            if report.unrecognized {
                self.log_warn(format!("Not a pack or archive: {}", source.display()));
            } else {
                self.log_info(format!(
                    "Installed {} file(s) from {} ({} skipped)",
                    report.installed.len(),
                    source.display(),
                    report.skipped.len()
                ));
            }
            reports.push((source.clone(), report));
        }
        self.packages = inventory::scan(&paths.content_dir, &self.registry);
        Ok(reports)
    }

    /// Deletes a package from disk, drops it from the active order and
    /// rewrites the script so the game no longer loads it.
    pub fn delete(&mut self, id: &str) -> Result<DeleteReport> {
        let paths = self.require_paths()?;
        if self.registry.contains(id) {
            return Err(ManagerError::UnknownPackage(id.to_string()).into());
        }
        let report = install::delete_package(id, &paths.content_dir)?;
        let was_active = self.order.deactivate(id);
        if was_active {
            self.store.write(&self.order)?;
        }
        self.write_script("delete")?;
        self.packages = inventory::scan(&paths.content_dir, &self.registry);
        self.log_info(format!(
            "Deleted {id} ({} file(s) removed{})",
            report.removed.len(),
            if was_active { ", deactivated" } else { "" }
        ));
        Ok(report)
    }

    pub fn restore_last_backup(&mut self) -> Result<Restored> {
        let paths = self.require_paths()?;
        let backup_dir =
            backup::load_last_backup(&self.config.data_dir)?.ok_or(ManagerError::NoBackup)?;
        let restored = backup::restore_backup(&backup_dir, &paths.script_path, self.store.path())?;
        self.log_info(format!("Restored backup {}", backup_dir.display()));
        self.refresh()?;
        Ok(restored)
    }

    /// Starts the game with the game root as working directory.
    pub fn launch(&mut self) -> Result<()> {
        let paths = self.require_paths()?;
        if !paths.executable.is_file() {
            self.log_error(format!("Launch failed: {} missing", paths.executable.display()));
            return Err(ManagerError::ExecutableMissing(paths.executable).into());
        }
        match Command::new(&paths.executable)
            .current_dir(&paths.game_root)
            .spawn()
        {
            Ok(_) => {
                self.log_info(format!("Launched {}", paths.executable.display()));
                Ok(())
            }
            Err(source) => {
                self.log_error(format!("Launch failed: {source}"));
                Err(ManagerError::Launch {
                    path: paths.executable,
                    source,
                }
                .into())
            }
        }
    }

    pub fn set_game_root(&mut self, path: PathBuf) -> Result<()> {
        if !warhammer2::looks_like_game_root(&path) {
            anyhow::bail!("invalid game root: expected data/ in {}", path.display());
        }
        self.config.game_root = path;
        self.reconfigure()
    }

    pub fn set_script_path(&mut self, path: PathBuf) -> Result<()> {
        self.config.script_path = path;
        self.reconfigure()
    }

    pub fn set_standard_list(&mut self, path: PathBuf) -> Result<()> {
        self.config.standard_list = Some(path);
        self.reconfigure()
    }

    fn reconfigure(&mut self) -> Result<()> {
        self.config.save()?;
        self.detect_paths();
        self.refresh()
    }

    pub fn log_info(&mut self, message: String) {
        self.push_log(LogLevel::Info, message);
    }

    pub fn log_warn(&mut self, message: String) {
        self.push_log(LogLevel::Warn, message);
    }

    pub fn log_error(&mut self, message: String) {
        self.push_log(LogLevel::Error, message);
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        if self.echo_logs {
            eprintln!("[{}] {message}", log_level_label(level));
        }
        let _ = append_log_file(&self.log_path, level, &message);

        self.logs.push(LogEntry { level, message });
        if self.logs.len() > LOG_CAPACITY {
            let overflow = self.logs.len() - LOG_CAPACITY;
            self.logs.drain(0..overflow);
        }
    }
}

pub fn log_level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

fn append_log_file(path: &Path, level: LogLevel, message: &str) -> std::io::Result<()> {
    let label = log_level_label(level);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "[{label}] {message}")
}
