//! Configuration file parsing for devmon
//!
//! Supports a single TOML file with `[devmon]` and `[poll]` sections.

pub mod settings;
pub mod types;

pub use settings::{load_settings, load_settings_strict, parse_settings, DEFAULT_CONFIG_PATH};
pub use types::*;
