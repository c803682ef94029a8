pub mod app;
pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod fsio;
pub mod game;
pub mod install;
pub mod inventory;
pub mod order;
pub mod script;
pub mod standard;
pub mod warhammer2;
