use crate::app_dirs::AppDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tunables for the tension sprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SprintConfig {
    pub duration_ms: u64,
    pub tension_per_tap: f64,
    pub decay_per_sec: f64,
    pub starting_tension: f64,
}

impl Default for SprintConfig {
    fn default() -> Self {
        Self {
            duration_ms: 12_000,
            tension_per_tap: 8.0,
            decay_per_sec: 25.0,
            starting_tension: 50.0,
        }
    }
}

/// Tunables for the beat scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BeatConfig {
    pub period_ms: f64,
    pub jitter_ms: f64,
    pub window: f64,
    pub technique_divisor: f64,
    pub max_window: f64,
    pub max_charge: u32,
    pub burst_ms: f64,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            period_ms: 1_200.0,
            jitter_ms: 0.0,
            window: 0.15,
            technique_divisor: 200.0,
            max_window: 0.45,
            max_charge: 3,
            burst_ms: 1_000.0,
        }
    }
}

/// Tunables for the beat race field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RaceConfig {
    pub duration_ms: u64,
    pub length: f64,
    pub lanes: u32,
    pub opponents: u32,
    pub burst_multiplier: f64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            duration_ms: 30_000,
            length: 1_000.0,
            lanes: 3,
            opponents: 3,
            burst_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub countdown_secs: u32,
    /// Longest slice simulated in one step; longer frame deltas are subdivided.
    pub max_step_ms: f64,
    pub tick_rate_ms: u64,
    pub sprint: SprintConfig,
    pub beat: BeatConfig,
    pub race: RaceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            max_step_ms: 50.0,
            tick_rate_ms: 16,
            sprint: SprintConfig::default(),
            beat: BeatConfig::default(),
            race: RaceConfig::default(),
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> crate::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("uma_stable_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!("ignoring malformed config {}: {e}", self.path.display()),
            },
            Err(e) => log::debug!("no config at {}: {e}", self.path.display()),
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
