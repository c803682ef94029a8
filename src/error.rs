use std::path::PathBuf;
use thiserror::Error;

/// Failures the CLI reports differently from plain I/O errors.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Game folder is not set\n\nHint: run `packsmith config set-game-root <dir>`")]
    GameRootNotSet,

    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    #[error("Package name cannot be declared in the load-order script: {0:?}")]
    UndeclarableName(String),

    #[error("Package is not active: {0}")]
    NotActive(String),

    #[error("Game executable not found: {}", .0.display())]
    ExecutableMissing(PathBuf),

    #[error("Failed to launch {}: {source}", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No backup to restore")]
    NoBackup,
}
