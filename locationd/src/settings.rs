//! Persisted daemon settings: dotted-path keys mapping to string values,
//! one `key = value` line per entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no value for key {0:?}")]
    NoValueForKey(String),
    #[error("value for key {key:?} does not parse: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("i/o error on the settings store: {0}")]
    Io(#[from] std::io::Error),
}

/// A key/value store backed by a flat file. Values are kept as their
/// textual representation; typed accessors parse on demand. Writes land on
/// disk on [`Settings::sync`] and when the store is dropped.
pub struct Settings {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl Settings {
    /// Opens the store, loading any existing file. A missing file is an
    /// empty store, a corrupt line is skipped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let mut values = BTreeMap::new();
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                for line in contents.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    match line.split_once('=') {
                        Some((key, value)) => {
                            values.insert(key.trim().to_string(), value.trim().to_string());
                        }
                        None => warn!("skipping malformed settings line {line:?}"),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_value_for_key(&self, key: &str) -> bool {
        self.values
            .lock()
            .expect("settings store poisoned")
            .contains_key(key)
    }

    /// Strict read: a missing key is an error.
    pub fn get_string_for_key_or_throw(&self, key: &str) -> Result<String, SettingsError> {
        self.values
            .lock()
            .expect("settings store poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| SettingsError::NoValueForKey(key.to_string()))
    }

    /// Defaulting read: a missing key reads as `default`.
    pub fn get_string_for_key(&self, key: &str, default: impl Into<String>) -> String {
        self.get_string_for_key_or_throw(key)
            .unwrap_or_else(|_| default.into())
    }

    /// Typed strict read; parses through the value's `FromStr`.
    pub fn get_for_key_or_throw<T: FromStr>(&self, key: &str) -> Result<T, SettingsError> {
        let value = self.get_string_for_key_or_throw(key)?;
        value.parse().map_err(|_| SettingsError::InvalidValue {
            key: key.to_string(),
            value,
        })
    }

    /// Typed defaulting read.
    pub fn get_for_key<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get_for_key_or_throw(key).unwrap_or(default)
    }

    pub fn set_string_for_key(&self, key: &str, value: impl Into<String>) {
        self.values
            .lock()
            .expect("settings store poisoned")
            .insert(key.to_string(), value.into());
    }

    /// Typed write via the value's textual representation.
    pub fn set_for_key<T: ToString>(&self, key: &str, value: T) {
        self.set_string_for_key(key, value.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        self.values
            .lock()
            .expect("settings store poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Writes the current values to disk.
    pub fn sync(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents: String = self
            .values
            .lock()
            .expect("settings store poisoned")
            .iter()
            .map(|(key, value)| format!("{key} = {value}\n"))
            .collect();
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl Drop for Settings {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            warn!("could not sync settings to {:?}: {e}", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("locationd-settings-{name}-{}", std::process::id()))
    }

    #[test]
    fn missing_keys_read_as_defaults_and_fail_strictly() {
        let path = temp_path("defaults");
        let settings = Settings::open(&path).unwrap();

        assert_eq!(settings.get_string_for_key("service.bus", "session"), "session");
        assert!(matches!(
            settings.get_string_for_key_or_throw("service.bus"),
            Err(SettingsError::NoValueForKey(_))
        ));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn values_round_trip_through_sync() {
        let path = temp_path("roundtrip");
        {
            let settings = Settings::open(&path).unwrap();
            settings.set_string_for_key("service.bus", "system");
            settings.set_for_key("engine.enabled", true);
            settings.set_for_key("provider.gps.baud", 4800u32);
            settings.sync().unwrap();
        }
        {
            let settings = Settings::open(&path).unwrap();
            assert_eq!(
                settings.get_string_for_key_or_throw("service.bus").unwrap(),
                "system"
            );
            assert!(settings.get_for_key("engine.enabled", false));
            assert_eq!(settings.get_for_key_or_throw::<u32>("provider.gps.baud").unwrap(), 4800);
        }
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn drop_syncs_to_disk() {
        let path = temp_path("dropsync");
        {
            let settings = Settings::open(&path).unwrap();
            settings.set_string_for_key("a.b.c", "1");
        }
        let reloaded = Settings::open(&path).unwrap();
        assert!(reloaded.has_value_for_key("a.b.c"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn malformed_values_are_typed_errors() {
        let path = temp_path("typed");
        let settings = Settings::open(&path).unwrap();
        settings.set_string_for_key("engine.enabled", "not-a-bool");
        assert!(matches!(
            settings.get_for_key_or_throw::<bool>("engine.enabled"),
            Err(SettingsError::InvalidValue { .. })
        ));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored_on_load() {
        let path = temp_path("comments");
        std::fs::write(&path, "# a comment\n\nservice.bus = session\nbroken-line\n").unwrap();
        let settings = Settings::open(&path).unwrap();
        assert_eq!(settings.keys(), vec!["service.bus".to_string()]);
        let _ = std::fs::remove_file(path);
    }
}
