pub mod app;
pub mod cli;
pub mod config;
pub mod formatting;
pub mod layout;
pub mod preview;
pub mod storage;
pub mod title;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
