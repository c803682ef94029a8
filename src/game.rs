use crate::warhammer2;
use serde::{Deserialize, Serialize};

/// Game a configuration belongs to. Stored in the config files and used to
/// name the per-game data dir.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameId {
    #[default]
    Warhammer2,
}

impl GameId {
    pub fn display_name(self) -> &'static str {
        match self {
            GameId::Warhammer2 => warhammer2::GAME_NAME,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameId::Warhammer2 => "warhammer2",
        }
    }
}
