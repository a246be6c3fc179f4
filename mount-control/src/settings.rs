//! Persisted mount settings.
//!
//! Every scalar has a valid range and a hard-coded default. Values that
//! come back out of range (or a file that cannot be read or parsed at
//! all) fall back to the default rather than failing startup; a mount
//! with factory settings is always usable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// User-tunable mount state surviving restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountSettings {
    /// Mount pole declination, degrees, `[-90, 90]`.
    pub pole_dec_deg: f64,
    /// Mount pole right ascension, degrees, `[0, 360)`.
    pub pole_ra_deg: f64,
    /// Right-ascension axis offset, degrees, `[0, 360)`.
    pub ra_offset_deg: f64,
    /// Observer longitude, degrees east, `[-180, 180]`.
    pub longitude_deg: f64,
    /// Observer latitude, degrees north, `[-90, 90]`.
    pub latitude_deg: f64,
    /// Camera exposure length, seconds, `[1, 9999]`.
    pub shooting_time_s: u32,
    /// Delay between exposures, seconds, `[1, 9999]`.
    pub shooting_delay_s: u32,
}

impl Default for MountSettings {
    fn default() -> Self {
        Self {
            pole_dec_deg: 90.0,
            pole_ra_deg: 0.0,
            ra_offset_deg: 0.0,
            longitude_deg: 16.260_771_9,
            latitude_deg: 49.822_500_3,
            shooting_time_s: 30,
            shooting_delay_s: 30,
        }
    }
}

impl MountSettings {
    /// Replaces every out-of-range field with its default.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        // Declination-like fields have inclusive bounds, right-ascension
        // fields a half-open [0, 360).
        fn check_closed(name: &str, value: &mut f64, lo: f64, hi: f64, default: f64) {
            if !value.is_finite() || *value < lo || *value > hi {
                warn!(name, value = *value, default, "setting out of range, using default");
                *value = default;
            }
        }
        fn check_ra(name: &str, value: &mut f64, default: f64) {
            if !value.is_finite() || *value < 0.0 || *value >= 360.0 {
                warn!(name, value = *value, default, "setting out of range, using default");
                *value = default;
            }
        }
        fn check_u32(name: &str, value: &mut u32, lo: u32, hi: u32, default: u32) {
            if *value < lo || *value > hi {
                warn!(name, value = *value, default, "setting out of range, using default");
                *value = default;
            }
        }

        check_closed(
            "pole_dec_deg",
            &mut self.pole_dec_deg,
            -90.0,
            90.0,
            defaults.pole_dec_deg,
        );
        check_ra("pole_ra_deg", &mut self.pole_ra_deg, defaults.pole_ra_deg);
        check_ra(
            "ra_offset_deg",
            &mut self.ra_offset_deg,
            defaults.ra_offset_deg,
        );
        check_closed(
            "longitude_deg",
            &mut self.longitude_deg,
            -180.0,
            180.0,
            defaults.longitude_deg,
        );
        check_closed(
            "latitude_deg",
            &mut self.latitude_deg,
            -90.0,
            90.0,
            defaults.latitude_deg,
        );
        check_u32(
            "shooting_time_s",
            &mut self.shooting_time_s,
            1,
            9999,
            defaults.shooting_time_s,
        );
        check_u32(
            "shooting_delay_s",
            &mut self.shooting_delay_s,
            1,
            9999,
            defaults.shooting_delay_s,
        );

        self
    }
}

/// Storage manager for the mount settings file.
///
/// Settings live in a single JSON file under a root directory
/// (defaults to `~/.mount_config/`).
#[derive(Debug, Clone)]
pub struct SettingsStore {
    root_path: PathBuf,
}

impl SettingsStore {
    /// Create a settings store at the default path (`~/.mount_config`).
    pub fn new() -> std::io::Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        Ok(Self {
            root_path: PathBuf::from(home).join(".mount_config"),
        })
    }

    /// Create a settings store with a custom root path.
    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn settings_path(&self) -> PathBuf {
        self.root_path.join("mount_settings.json")
    }

    /// Load settings, falling back to defaults when the file is missing,
    /// unreadable, or holds out-of-range values.
    pub fn load(&self) -> MountSettings {
        let path = self.settings_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(?path, %err, "no readable settings file, using defaults");
                return MountSettings::default();
            }
        };

        match serde_json::from_str::<MountSettings>(&raw) {
            Ok(settings) => settings.sanitized(),
            Err(err) => {
                warn!(?path, %err, "settings file unparsable, using defaults");
                MountSettings::default()
            }
        }
    }

    /// Save settings, creating the config directory if needed.
    ///
    /// Returns the path the settings were written to.
    pub fn save(&self, settings: &MountSettings) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root_path)?;

        let path = self.settings_path();
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SettingsStore::with_path(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let (_dir, store) = store();
        assert_eq!(store.load(), MountSettings::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (_dir, store) = store();

        let settings = MountSettings {
            pole_dec_deg: 70.0,
            pole_ra_deg: 30.0,
            ra_offset_deg: 10.0,
            ..MountSettings::default()
        };

        let path = store.save(&settings).unwrap();
        assert!(path.exists());

        let loaded = store.load();
        assert_relative_eq!(loaded.pole_dec_deg, 70.0);
        assert_relative_eq!(loaded.pole_ra_deg, 30.0);
        assert_relative_eq!(loaded.ra_offset_deg, 10.0);
    }

    #[test]
    fn test_out_of_range_values_fall_back_per_field() {
        let (_dir, store) = store();

        let settings = MountSettings {
            pole_dec_deg: 120.0,
            pole_ra_deg: 30.0,
            shooting_time_s: 0,
            ..MountSettings::default()
        };
        store.save(&settings).unwrap();

        let loaded = store.load();
        assert_relative_eq!(loaded.pole_dec_deg, 90.0);
        assert_relative_eq!(loaded.pole_ra_deg, 30.0);
        assert_eq!(loaded.shooting_time_s, 30);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.root_path()).unwrap();
        std::fs::write(store.root_path().join("mount_settings.json"), "{ nope").unwrap();

        assert_eq!(store.load(), MountSettings::default());
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.root_path()).unwrap();
        std::fs::write(
            store.root_path().join("mount_settings.json"),
            r#"{ "pole_dec_deg": 45.0 }"#,
        )
        .unwrap();

        let loaded = store.load();
        assert_relative_eq!(loaded.pole_dec_deg, 45.0);
        assert_relative_eq!(loaded.longitude_deg, 16.260_771_9);
    }

    #[test]
    fn test_inclusive_bounds_survive() {
        let settings = MountSettings {
            pole_dec_deg: 90.0,
            latitude_deg: -90.0,
            longitude_deg: 180.0,
            ..MountSettings::default()
        }
        .sanitized();

        assert_relative_eq!(settings.pole_dec_deg, 90.0);
        assert_relative_eq!(settings.latitude_deg, -90.0);
        assert_relative_eq!(settings.longitude_deg, 180.0);
    }
}
