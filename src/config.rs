// Miner Configuration
//
// JSON config file with a default for every field. The mining arguments keep
// the values the app has always shipped with.

use crate::error::MinerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "mobile-miner";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Bundled miner binary shipped with the app
    pub asset_path: PathBuf,
    /// App-private writable storage (staged binary, preferences)
    pub data_dir: PathBuf,
    pub executable_name: String,

    pub algorithm: String,
    pub pool_url: String,
    pub wallet: String,
    pub password: String,
    pub threads: u32,

    pub min_battery_percent: f32,
    pub max_temperature_celsius: i32,

    pub termination_grace_ms: u64,
    pub exit_poll_ms: u64,
    pub sample_interval_ms: u64,
    pub power_supply_dir: PathBuf,

    /// Overrides device model detection for worker names
    pub device_model: Option<String>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            asset_path: PathBuf::from("assets").join("ccminer"),
            data_dir,
            executable_name: "ccminer".to_string(),
            algorithm: "verus".to_string(),
            pool_url: "stratum+tcp://ap.luckpool.net:3956".to_string(),
            wallet: "RNjEn7tNTZ6DuYnYrxKMsvYzBgJ11P5hQ4".to_string(),
            password: "x".to_string(),
            threads: 5,
            min_battery_percent: 20.0,
            max_temperature_celsius: 40,
            termination_grace_ms: 5_000,
            exit_poll_ms: 500,
            sample_interval_ms: 5_000,
            power_supply_dir: PathBuf::from("/sys/class/power_supply"),
            device_model: None,
        }
    }
}

impl MinerConfig {
    /// Default config location: <config_dir>/mobile-miner/config.json
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load config. An explicit path must exist; a missing default file
    /// falls back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, MinerError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, MinerError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| MinerError::Config(format!("{}: {}", path.display(), e)))?;
        let config: MinerConfig = serde_json::from_str(&contents)
            .map_err(|e| MinerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<(), MinerError> {
        if self.executable_name.is_empty() {
            return Err(MinerError::Config("executable_name must not be empty".to_string()));
        }
        if self.threads == 0 {
            return Err(MinerError::Config("threads must be at least 1".to_string()));
        }
        if !(0.0..=100.0).contains(&self.min_battery_percent) {
            return Err(MinerError::Config(format!(
                "min_battery_percent out of range: {}",
                self.min_battery_percent
            )));
        }
        Ok(())
    }

    /// Where the bundled binary is staged
    pub fn executable_path(&self) -> PathBuf {
        self.data_dir.join(&self.executable_name)
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    pub fn exit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.exit_poll_ms.max(10))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(10))
    }
}
