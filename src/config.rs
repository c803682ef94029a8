use crate::{fsio, game::GameId, warhammer2};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

pub const DATA_DIR_ENV: &str = "PACKSMITH_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub active_game: GameId,
    #[serde(default = "default_true")]
    pub confirm_mod_delete: bool,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig {
            active_game: GameId::default(),
            confirm_mod_delete: true,
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = base_data_dir()?.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fsio::write_atomic_text(&path, &raw).context("write app config")
    }
}

/// Per-game settings. Empty paths mean "auto-detect".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub game_id: GameId,
    pub game_name: String,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub game_root: PathBuf,
    #[serde(default)]
    pub script_path: PathBuf,
    #[serde(default)]
    pub standard_list: Option<PathBuf>,
}

impl GameConfig {
    pub fn load_or_create(game: GameId) -> Result<Self> {
        let data_dir = data_dir_for_game(game)?;
        fs::create_dir_all(&data_dir).context("create data dir")?;

        let config_path = data_dir.join("config.json");
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path).context("read config")?;
            let mut config: GameConfig = serde_json::from_str(&raw).context("parse config")?;
            config.game_id = game;
            config.game_name = game.display_name().to_string();
            config.data_dir = data_dir;
            config.save()?;
            return Ok(config);
        }

        let (game_root, script_path) = match warhammer2::detect_paths(None, None) {
            Ok(paths) => (paths.game_root, paths.script_path),
            Err(_) => (PathBuf::new(), PathBuf::new()),
        };

        let config = GameConfig {
            game_id: game,
            game_name: game.display_name().to_string(),
            data_dir,
            game_root,
            script_path,
            standard_list: None,
        };

        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.data_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize config")?;
        fsio::write_atomic_text(&config_path, &raw).context("write config")
    }

    pub fn game_root_override(&self) -> Option<&std::path::Path> {
        non_empty(&self.game_root)
    }

    pub fn script_override(&self) -> Option<&std::path::Path> {
        non_empty(&self.script_path)
    }

    /// Standard pack list; defaults to `standard_packs.txt` in the data dir.
    pub fn standard_list_path(&self) -> PathBuf {
        self.standard_list
            .clone()
            .unwrap_or_else(|| self.data_dir.join("standard_packs.txt"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("packsmith.log")
    }
}

pub fn data_dir_for_game(game: GameId) -> Result<PathBuf> {
    let base = base_data_dir()?;
    Ok(base.join(game.as_str()))
}

fn non_empty(path: &std::path::Path) -> Option<&std::path::Path> {
    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

fn default_true() -> bool {
    true
}

fn base_data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("packsmith"))
}
