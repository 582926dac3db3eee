use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::world::grid::DEFAULT_CELL_SIZE;
use crate::world::movement::DEFAULT_MOVEMENT_SCALE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("usage: zonesim <data-root> [zone-short-name ...]")]
    Usage,
    #[error("{name} must be a number, got '{value}'")]
    BadEnv { name: &'static str, value: String },
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub root: PathBuf,
    pub zones: Vec<String>,
    pub autosave_secs: Option<u64>,
    pub cell_size: Option<f64>,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        Self::from_args_with_env(args, |name| std::env::var(name).ok())
    }

    fn from_args_with_env(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if args.len() < 2 {
            return Err(ConfigError::Usage);
        }
        let root = Path::new(&args[1]).to_path_buf();
        let zones = args[2..]
            .iter()
            .map(|zone| zone.trim().to_ascii_lowercase())
            .filter(|zone| !zone.is_empty())
            .collect();
        let autosave_secs = env_number("ZONESIM_AUTOSAVE_SECS", &env)?;
        let cell_size = env_number("ZONESIM_CELL_SIZE", &env)?;
        Ok(Self {
            root,
            zones,
            autosave_secs,
            cell_size,
        })
    }

    /// Zone settings from `<root>/config.yaml`, with environment overrides applied.
    pub fn zone_config(&self) -> Result<ZoneConfig, ConfigError> {
        let mut config = ZoneConfig::load(&self.root)?;
        if let Some(secs) = self.autosave_secs {
            config.autosave_secs = secs;
        }
        if let Some(size) = self.cell_size {
            config.cell_size = size;
        }
        Ok(config)
    }
}

fn env_number<T: std::str::FromStr>(
    name: &'static str,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = env(name) else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::BadEnv {
            name,
            value: trimmed.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub cell_size: f64,
    pub spawn_tick_ms: u64,
    pub flush_tick_ms: u64,
    pub world_tick_secs: u64,
    pub respawn_ceiling_secs: u64,
    pub movement_scale: f64,
    pub autosave_secs: u64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            spawn_tick_ms: 50,
            flush_tick_ms: 50,
            world_tick_secs: 6,
            respawn_ceiling_secs: 86_400,
            movement_scale: DEFAULT_MOVEMENT_SCALE,
            autosave_secs: 0,
        }
    }
}

impl ZoneConfig {
    /// Missing file means defaults.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join("config.yaml");
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn spawn_tick(&self) -> Duration {
        Duration::from_millis(self.spawn_tick_ms.max(1))
    }

    pub fn flush_tick(&self) -> Duration {
        Duration::from_millis(self.flush_tick_ms.max(1))
    }

    pub fn world_tick(&self) -> Duration {
        Duration::from_secs(self.world_tick_secs.max(1))
    }

    pub fn respawn_ceiling(&self) -> Duration {
        Duration::from_secs(self.respawn_ceiling_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn from_args_requires_root() {
        let err = AppConfig::from_args_with_env(&args(&["zonesim"]), |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::Usage));
    }

    #[test]
    fn from_args_collects_zones_and_env() {
        let config = AppConfig::from_args_with_env(
            &args(&["zonesim", "/srv/data", "Qeynos", " ", "freportn"]),
            |name| match name {
                "ZONESIM_AUTOSAVE_SECS" => Some("120".to_string()),
                "ZONESIM_CELL_SIZE" => Some(" ".to_string()),
                _ => None,
            },
        )
        .expect("config");
        assert_eq!(config.root, PathBuf::from("/srv/data"));
        assert_eq!(config.zones, vec!["qeynos", "freportn"]);
        assert_eq!(config.autosave_secs, Some(120));
        assert_eq!(config.cell_size, None);
    }

    #[test]
    fn from_args_rejects_bad_number() {
        let err = AppConfig::from_args_with_env(&args(&["zonesim", "."]), |name| {
            (name == "ZONESIM_CELL_SIZE").then(|| "wide".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::BadEnv { name: "ZONESIM_CELL_SIZE", .. }));
    }

    #[test]
    fn zone_config_defaults_without_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ZoneConfig::load(dir.path()).expect("config");
        assert_eq!(config, ZoneConfig::default());
        assert_eq!(config.cell_size, 300.0);
        assert_eq!(config.world_tick(), Duration::from_secs(6));
        assert_eq!(config.respawn_ceiling(), Duration::from_secs(86_400));
    }

    #[test]
    fn zone_config_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("config.yaml"), "spawn_tick_ms: 20\nautosave_secs: 30\n")
            .expect("write");
        let config = ZoneConfig::load(dir.path()).expect("config");
        assert_eq!(config.spawn_tick(), Duration::from_millis(20));
        assert_eq!(config.autosave_secs, 30);
        assert_eq!(config.flush_tick_ms, 50);
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("config.yaml"), "cell_size: 100\n").expect("write");
        let app = AppConfig {
            root: dir.path().to_path_buf(),
            zones: Vec::new(),
            autosave_secs: Some(5),
            cell_size: Some(450.0),
        };
        let config = app.zone_config().expect("config");
        assert_eq!(config.cell_size, 450.0);
        assert_eq!(config.autosave_secs, 5);
    }
}
