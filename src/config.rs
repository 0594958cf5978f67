use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub ports: PortsConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MonitoringConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_process_filter")]
    pub process_filter: String,
    #[serde(default = "default_max_processes_shown")]
    pub max_processes_shown: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RunnerConfig {
    #[serde(default = "default_completion_delay_ms")]
    pub completion_delay_ms: u64,
    #[serde(default = "default_output_window")]
    pub output_window: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PortsConfig {
    #[serde(default = "default_status_clear_ms")]
    pub status_clear_ms: u64,
    #[serde(default)]
    pub extra_ports: Vec<u16>,
}

// Defaults for MonitoringConfig
fn default_poll_interval_secs() -> u64 {
    5
}

fn default_process_filter() -> String {
    "node".to_string()
}

fn default_max_processes_shown() -> usize {
    10
}

// Defaults for RunnerConfig
fn default_completion_delay_ms() -> u64 {
    2000
}

fn default_output_window() -> usize {
    15
}

// Defaults for PortsConfig
fn default_status_clear_ms() -> u64 {
    2000
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            process_filter: default_process_filter(),
            max_processes_shown: default_max_processes_shown(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            completion_delay_ms: default_completion_delay_ms(),
            output_window: default_output_window(),
        }
    }
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            status_clear_ms: default_status_clear_ms(),
            extra_ports: Vec::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.monitoring.poll_interval_secs == 0 {
            bail!("monitoring.poll_interval_secs must be at least 1");
        }
        if self.monitoring.process_filter.trim().is_empty() {
            bail!("monitoring.process_filter must not be empty");
        }
        if self.runner.output_window == 0 {
            bail!("runner.output_window must be at least 1");
        }
        if self.ports.extra_ports.contains(&0) {
            bail!("ports.extra_ports must not contain port 0");
        }
        Ok(())
    }

    /// Detected ports followed by any configured extras, without duplicates.
    pub fn ports_of_interest(&self, detected: &[u16]) -> Vec<u16> {
        let mut ports = detected.to_vec();
        for port in &self.ports.extra_ports {
            if !ports.contains(port) {
                ports.push(*port);
            }
        }
        ports
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn get_config_path() -> PathBuf {
    home_dir().join(".prodh.json")
}

pub fn get_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(home_dir)
        .join("prodh")
        .join("prodh.log")
}

pub fn load_or_create_config(path: &Path) -> Result<Config> {
    if path.exists() {
        load_and_validate_config(path)
    } else {
        let config = Config::default();
        save_config(path, &config)?;
        Ok(config)
    }
}

pub fn load_and_validate_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).context("failed to read config file")?;
    let config =
        serde_json::from_str::<Config>(&content).context("failed to parse config file")?;
    config.validate().context("invalid config file")?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let content = serde_json::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(path, content).context("failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"monitoring": {"process_filter": "bun"}}"#).unwrap();
        assert_eq!(config.monitoring.process_filter, "bun");
        assert_eq!(config.monitoring.poll_interval_secs, 5);
        assert_eq!(config.runner.completion_delay_ms, 2000);
        assert_eq!(config.runner.output_window, 15);
        assert!(config.ports.extra_ports.is_empty());
    }

    #[test]
    fn creates_default_file_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".prodh.json");
        let config = load_or_create_config(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.monitoring.max_processes_shown, 10);
        let reloaded = load_and_validate_config(&path).unwrap();
        assert_eq!(reloaded.ports.status_clear_ms, 2000);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".prodh.json");
        fs::write(&path, r#"{"monitoring": {"poll_interval_secs": 0}}"#).unwrap();
        let err = load_and_validate_config(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("poll_interval_secs"));
    }

    #[test]
    fn extra_ports_extend_detected_ports_once() {
        let mut config = Config::default();
        config.ports.extra_ports = vec![3001, 9229];
        assert_eq!(config.ports_of_interest(&[3000, 3001]), vec![3000, 3001, 9229]);
    }
}
