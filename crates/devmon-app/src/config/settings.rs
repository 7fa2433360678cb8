//! Settings loading

use std::path::Path;

use devmon_core::prelude::*;

use super::types::Settings;

/// Default settings file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/devmon/devmon.toml";

/// Parse settings from TOML text
pub fn parse_settings(content: &str) -> Result<Settings> {
    toml::from_str(content).map_err(|e| Error::config(e.to_string()))
}

/// Load settings, falling back to defaults if the file is missing or bad
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_settings(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            Settings::default()
        }
    }
}

/// Load settings strictly: the file must exist, parse and validate
pub fn load_settings_strict(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let settings = parse_settings(&content)?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_parse_full_file() {
        let settings = parse_settings(
            r#"
[devmon]
tracking = ["ds", "if"]
cell_info_interval_short_ms = 1000
cell_info_interval_long_ms = 60000

[poll]
enabled = false
screen_state_path = "/tmp/screen"
power_supply_dir = "/tmp/power"
"#,
        )
        .unwrap();

        assert_eq!(
            settings.devmon.tracking,
            vec![Variant::DeviceState, Variant::IndicationFilter]
        );
        assert_eq!(settings.devmon.cell_info_interval_short_ms, 1000);
        assert_eq!(settings.devmon.cell_info_interval_long_ms, 60000);
        assert!(!settings.poll.enabled);
        assert_eq!(settings.poll.screen_state_path, PathBuf::from("/tmp/screen"));
    }

    #[test]
    fn test_parse_partial_file_uses_defaults() {
        let settings = parse_settings("[devmon]\ntracking = []\n").unwrap();
        assert!(settings.devmon.tracking.is_empty());
        assert_eq!(settings.devmon.cell_info_interval_long_ms, 30000);
        assert!(settings.poll.enabled);
    }

    #[test]
    fn test_parse_rejects_unknown_variant() {
        let err = parse_settings("[devmon]\ntracking = [\"xx\"]\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_settings(&dir.path().join("missing.toml"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_invalid_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("devmon.toml");
        std::fs::write(&path, "this is = not [valid").unwrap();
        assert_eq!(load_settings(&path), Settings::default());
    }

    #[test]
    fn test_load_strict() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("devmon.toml");

        assert!(matches!(
            load_settings_strict(&path),
            Err(Error::ConfigNotFound { .. })
        ));

        std::fs::write(&path, "[devmon]\ncell_info_interval_short_ms = 0\n").unwrap();
        assert!(matches!(
            load_settings_strict(&path),
            Err(Error::ConfigInvalid { .. })
        ));

        std::fs::write(&path, "[devmon]\ntracking = [\"if\"]\n").unwrap();
        let settings = load_settings_strict(&path).unwrap();
        assert_eq!(settings.devmon.tracking, vec![Variant::IndicationFilter]);
    }
}
