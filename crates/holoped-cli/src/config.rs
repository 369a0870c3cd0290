//! Configuration Vault – reads/writes `~/.holoped/config.toml`.

use holoped_runtime::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted user configuration stored in `~/.holoped/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket URL of the rosbridge server publishing the simulation.
    ///
    /// Connection setting for a live feed supplied by the host application;
    /// `holoped replay` does not connect anywhere and ignores it.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    /// Topic carrying the pedestrian telemetry batches (live feed only).
    #[serde(default = "default_topic")]
    pub telemetry_topic: String,

    /// Render ticks per second.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,

    /// Delay between batches when replaying a recording.
    #[serde(default = "default_replay_interval_ms")]
    pub replay_interval_ms: u64,

    #[serde(default)]
    pub session: SessionConfig,
}

fn default_rosbridge_url() -> String {
    "ws://192.168.0.19:9090".to_string()
}
fn default_topic() -> String {
    "/ped_sim/synthetic_pedestrians".to_string()
}
fn default_tick_hz() -> u32 {
    60
}
fn default_replay_interval_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rosbridge_url: default_rosbridge_url(),
            telemetry_topic: default_topic(),
            tick_hz: default_tick_hz(),
            replay_interval_ms: default_replay_interval_ms(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Wall-clock length of one render tick.  A zero rate is treated as 1 Hz.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay_interval_ms)
    }
}

/// Return the path to `~/.holoped/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".holoped").join("config.toml")
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
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    cfg.session.validate().map_err(|e| e.to_string())?;
    Ok(Some(cfg))
}

/// Apply `HOLOPED_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `HOLOPED_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `HOLOPED_TOPIC` | `telemetry_topic` |
/// | `HOLOPED_TICK_HZ` | `tick_hz` |
/// | `HOLOPED_SCALE` | `session.scale` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("HOLOPED_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("HOLOPED_TOPIC") {
        cfg.telemetry_topic = v;
    }
    if let Ok(v) = std::env::var("HOLOPED_TICK_HZ")
        && let Ok(hz) = v.parse::<u32>()
    {
        cfg.tick_hz = hz;
    }
    if let Ok(v) = std::env::var("HOLOPED_SCALE")
        && let Ok(scale) = v.parse::<f32>()
    {
        cfg.session.scale = scale;
    }
}

/// Built-in defaults with `HOLOPED_*` overrides applied, for when no usable
/// config file exists.
pub fn defaults_with_env() -> Config {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg);
    cfg
}

/// Save the config to disk, creating `~/.holoped/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only read/write (rw-------) on Unix.
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
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
