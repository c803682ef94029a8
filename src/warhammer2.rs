use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const GAME_NAME: &str = "Total War: WARHAMMER II";
pub const STEAM_APP_ID: &str = "594570";
pub const PACK_EXTENSION: &str = "pack";
pub const PREVIEW_EXTENSION: &str = "png";
pub const GAME_EXECUTABLE: &str = "Warhammer2.exe";
pub const SCRIPT_FILE_NAME: &str = "user.script.txt";

const STEAM_FOLDER: &str = "Total War WARHAMMER II";
const APPDATA_SUBDIR: &str = "The Creative Assembly/Warhammer2/scripts";

#[derive(Debug, Clone)]
pub struct GamePaths {
    pub game_root: PathBuf,
    pub content_dir: PathBuf,
    pub script_path: PathBuf,
    pub executable: PathBuf,
}

impl GamePaths {
    /// Paths derived from a root without checking the disk.
    pub fn from_root(game_root: PathBuf, script_path: PathBuf) -> Self {
        Self {
            content_dir: game_root.join("data"),
            executable: game_root.join(GAME_EXECUTABLE),
            game_root,
            script_path,
        }
    }
}

pub fn detect_paths(
    game_root_override: Option<&Path>,
    script_override: Option<&Path>,
) -> Result<GamePaths> {
    let game_root = match game_root_override {
        Some(path) => path.to_path_buf(),
        None => find_game_root().context("locate WARHAMMER II game directory")?,
    };

    let script_path = match script_override {
        Some(path) => path.to_path_buf(),
        None => find_script_path().context("locate WARHAMMER II user script")?,
    };

    if !looks_like_game_root(&game_root) {
        bail!(
            "invalid game root: expected data/ in {}",
            game_root.display()
        );
    }

    Ok(GamePaths::from_root(game_root, script_path))
}

fn find_game_root() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(home) = dirs_home() {
        candidates.push(home.join(".local/share/Steam"));
        candidates.push(home.join(".steam/steam"));
    }
    if cfg!(windows) {
        candidates.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
    }

    let mut libraries = Vec::new();
    for base in candidates {
        let vdf = base.join("steamapps/libraryfolders.vdf");
        if vdf.exists() {
            if let Ok(paths) = parse_steam_library_paths(&vdf) {
                libraries.extend(paths);
            }
        }
        libraries.push(base);
    }

    libraries
        .into_iter()
        .map(|lib| lib.join("steamapps/common").join(STEAM_FOLDER))
        .find(|candidate| looks_like_game_root(candidate))
}

/// The script lives in the roaming AppData folder; under Proton that is
/// inside the game's compatdata prefix.
fn find_script_path() -> Option<PathBuf> {
    if let Some(appdata) = std::env::var_os("APPDATA") {
        return Some(
            PathBuf::from(appdata)
                .join(APPDATA_SUBDIR)
                .join(SCRIPT_FILE_NAME),
        );
    }

    let home = dirs_home()?;
    let proton = home
        .join(".local/share/Steam/steamapps/compatdata")
        .join(STEAM_APP_ID)
        .join("pfx/drive_c/users/steamuser/AppData/Roaming")
        .join(APPDATA_SUBDIR)
        .join(SCRIPT_FILE_NAME);
    Some(proton)
}

fn parse_steam_library_paths(path: &Path) -> Result<Vec<PathBuf>> {
    let raw = fs::read_to_string(path).context("read libraryfolders.vdf")?;
    Ok(steam_library_paths(&raw))
}

fn steam_library_paths(raw: &str) -> Vec<PathBuf> {
    raw.lines()
        .map(str::trim)
        .filter_map(|line| {
            let rest = line.strip_prefix("\"path\"")?.trim();
            let value = rest.strip_prefix('"')?.strip_suffix('"')?;
            Some(PathBuf::from(value.replace("\\\\", "\\")))
        })
        .collect()
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|base| base.home_dir().to_path_buf())
}

pub fn looks_like_game_root(path: &Path) -> bool {
    path.join("data").is_dir()
}
