//! Data and log directories.
//!
//! The data directory is `sound-gate` under the platform config directory
//! (`%APPDATA%`, `~/Library/Application Support` or `$XDG_CONFIG_HOME`).
//! `SOUND_GATE_DATA_DIR` overrides it.

use std::path::PathBuf;

const DATA_DIR_ENV: &str = "SOUND_GATE_DATA_DIR";

/// Directory holding sound_gate.json and the log directory.
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    get_config_base().join("sound-gate")
}

/// Directory for rolling log files.
pub fn get_log_dir() -> PathBuf {
    get_data_dir().join("logs")
}

fn get_config_base() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_is_under_data_dir() {
        let data = get_data_dir();
        assert_eq!(get_log_dir(), data.join("logs"));
        if std::env::var_os(DATA_DIR_ENV).is_none() {
            assert!(data.ends_with("sound-gate"));
        }
    }
}
