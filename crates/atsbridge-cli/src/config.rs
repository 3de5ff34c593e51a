//! Bridge settings – reads/writes `~/.atsbridge/config.toml`.

use atsbridge_runtime::LogFormat;
use atsbridge_runtime::lifecycle::DEFAULT_CONFIG_FILE;
use atsbridge_types::{BrakeType, StartMode, TrainConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted user configuration stored in `~/.atsbridge/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// How the train is placed on the route when a module is loaded.
    #[serde(default)]
    pub start_mode: StartMode,

    /// Text encoding label of train files (e.g. `"utf-8"`, `"shift_jis"`).
    #[serde(default = "default_encoding")]
    pub train_encoding: String,

    /// Module configuration file looked up in the train folder.
    #[serde(default = "default_plugin_config")]
    pub plugin_config_file: String,

    /// Simulated time advanced by one `/tick`, in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Train driven by the shell.
    #[serde(default = "default_train")]
    pub train: TrainConfig,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}
fn default_plugin_config() -> String {
    DEFAULT_CONFIG_FILE.to_string()
}
fn default_tick_interval() -> u64 {
    100
}
fn default_train() -> TrainConfig {
    TrainConfig {
        brake_type: BrakeType::ElectromagneticStraightAirBrake,
        has_hold_brake: false,
        max_brake_notch: 8,
        max_power_notch: 5,
        single_handle: false,
        has_const_speed: false,
        cars: 10,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_mode: StartMode::default(),
            train_encoding: default_encoding(),
            plugin_config_file: default_plugin_config(),
            tick_interval_ms: default_tick_interval(),
            log_format: LogFormat::default(),
            train: default_train(),
        }
    }
}

/// Parse a start mode as typed by a user.
pub fn parse_start_mode(raw: &str) -> Option<StartMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "service" | "service-brakes-ats" => Some(StartMode::ServiceBrakesAts),
        "emergency" | "emergency-brakes-ats" => Some(StartMode::EmergencyBrakesAts),
        "emergency-no-ats" | "emergency-brakes-no-ats" => Some(StartMode::EmergencyBrakesNoAts),
        _ => None,
    }
}

/// Return the path to `~/.atsbridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".atsbridge").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ATSBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ATSBRIDGE_START_MODE` | `start_mode` |
/// | `ATSBRIDGE_ENCODING` | `train_encoding` |
/// | `ATSBRIDGE_TICK_MS` | `tick_interval_ms` |
/// | `ATSBRIDGE_LOG_FORMAT` | `log_format` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ATSBRIDGE_START_MODE")
        && let Some(mode) = parse_start_mode(&v)
    {
        cfg.start_mode = mode;
    }
    if let Ok(v) = std::env::var("ATSBRIDGE_ENCODING") {
        cfg.train_encoding = v;
    }
    if let Ok(v) = std::env::var("ATSBRIDGE_TICK_MS")
        && let Ok(ms) = v.parse::<u64>()
        && ms > 0
    {
        cfg.tick_interval_ms = ms;
    }
    if let Ok(v) = std::env::var("ATSBRIDGE_LOG_FORMAT")
        && let Ok(format) = v.parse::<LogFormat>()
    {
        cfg.log_format = format;
    }
}

/// Save the config to disk, creating `~/.atsbridge/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_custom_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.start_mode = StartMode::EmergencyBrakesNoAts;
        cfg.train_encoding = "shift_jis".to_string();
        cfg.train.brake_type = BrakeType::AutomaticAirBrake;
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.start_mode, StartMode::EmergencyBrakesNoAts);
        assert_eq!(loaded.train_encoding, "shift_jis");
        assert_eq!(loaded.train.brake_type, BrakeType::AutomaticAirBrake);
        assert_eq!(loaded.plugin_config_file, "ats.cfg");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: Config = toml::from_str("tick_interval_ms = 250").expect("parse");
        assert_eq!(cfg.tick_interval_ms, 250);
        assert_eq!(cfg.train_encoding, "utf-8");
        assert_eq!(cfg.train.max_brake_notch, 8);
    }

    #[test]
    fn config_path_points_to_atsbridge_dir() {
        let p = config_path_for_home("/home/driver");
        assert!(p.to_string_lossy().contains(".atsbridge"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn start_mode_names() {
        assert_eq!(parse_start_mode("Emergency"), Some(StartMode::EmergencyBrakesAts));
        assert_eq!(parse_start_mode("service-brakes-ats"), Some(StartMode::ServiceBrakesAts));
        assert_eq!(parse_start_mode("sideways"), None);
    }

    #[test]
    fn env_overrides_tick_interval() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ATSBRIDGE_TICK_MS", "40") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.tick_interval_ms, 40);
        unsafe { std::env::remove_var("ATSBRIDGE_TICK_MS") };
    }

    #[test]
    fn env_overrides_ignore_invalid_start_mode() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ATSBRIDGE_START_MODE", "backwards") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.start_mode, StartMode::ServiceBrakesAts);
        unsafe { std::env::remove_var("ATSBRIDGE_START_MODE") };
    }
}
