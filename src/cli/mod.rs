pub mod directory;
pub mod hook;
pub mod prompt;
pub mod trust;

use std::path::PathBuf;

use crate::config::Settings;
use crate::error::Result;

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn load_settings() -> Result<Settings> {
    Settings::load_project(&current_dir())
}
