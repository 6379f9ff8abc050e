//! Configuration management for entropy-guard

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `reputation.api_key`
pub const API_KEY_ENV: &str = "ENTROPY_GUARD_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory to monitor
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Reference list of known extensions, one per line
    #[serde(default = "default_extensions_path")]
    pub extensions: PathBuf,

    /// Glob patterns the monitor skips
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Detection thresholds
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Encryption confirmation protocol
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Directory monitoring
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Hash reputation lookups
    #[serde(default)]
    pub reputation: ReputationConfig,

    /// Alert configuration
    #[serde(default)]
    pub alerts: AlertConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            extensions: default_extensions_path(),
            exclude: vec!["*.swp".to_string(), "*.part".to_string()],
            detection: DetectionConfig::default(),
            confirmation: ConfirmationConfig::default(),
            monitor: MonitorConfig::default(),
            reputation: ReputationConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {:?}", path))?;
        let config: Config =
            serde_yaml::from_str(&content).with_context(|| format!("parsing {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {:?}", path))?;
        Ok(())
    }

    /// Compile the exclude patterns. Invalid patterns are skipped with a warning.
    pub fn exclusions(&self) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => tracing::warn!("Ignoring exclude pattern {:?}: {}", pattern, e),
            }
        }
        builder.build().unwrap_or_else(|e| {
            tracing::warn!("Failed to build exclude set: {}", e);
            GlobSet::empty()
        })
    }

    /// Check if a path should be excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        is_excluded(&self.exclusions(), path)
    }

    /// API key from the environment, falling back to the file
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.reputation.api_key.clone().filter(|k| !k.is_empty()))
    }
}

/// Match a path, or its bare file name, against an exclude set
pub fn is_excluded(set: &GlobSet, path: &Path) -> bool {
    if set.is_match(path) {
        return true;
    }
    path.file_name().is_some_and(|name| set.is_match(name))
}

/// Detection thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Size change in bytes considered significant
    #[serde(default = "default_size_threshold")]
    pub size_threshold_bytes: u64,

    /// Entropy above which content looks encrypted (0.0 - 8.0)
    #[serde(default = "default_entropy_threshold")]
    pub entropy_threshold: f64,

    /// Whether extensions with no registered verifier count as openable
    #[serde(default = "default_true")]
    pub unknown_is_openable: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            size_threshold_bytes: default_size_threshold(),
            entropy_threshold: default_entropy_threshold(),
            unknown_is_openable: true,
        }
    }
}

/// Encryption confirmation protocol timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Total observation window in seconds
    #[serde(default = "default_confirmation_duration")]
    pub duration_secs: u64,

    /// Seconds between samples
    #[serde(default = "default_confirmation_interval")]
    pub interval_secs: u64,
}

impl ConfirmationConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_confirmation_duration(),
            interval_secs: default_confirmation_interval(),
        }
    }
}

/// Monitoring strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    /// List the directory on a fixed interval
    Polling,
    /// Subscribe to inotify events
    Event,
}

/// Directory monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_mode")]
    pub mode: MonitorMode,

    /// Seconds between polling iterations
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Number of polling iterations per session
    #[serde(default = "default_poll_iterations")]
    pub poll_iterations: u32,

    /// Event-mode observation window in seconds
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            poll_interval_secs: default_poll_interval(),
            poll_iterations: default_poll_iterations(),
            window_secs: default_window(),
        }
    }
}

/// Reputation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Bearer token for the lookup service. Lookups are skipped without one.
    pub api_key: Option<String>,

    /// Base URL; the content hash is appended as the last path segment
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AlertConfig {
    /// Enable desktop notifications
    #[serde(default)]
    pub desktop: bool,

    /// Webhook URL receiving a JSON POST per alert
    pub webhook: Option<String>,
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_extensions_path() -> PathBuf {
    PathBuf::from("/etc/entropy-guard/extensions.txt")
}

fn default_size_threshold() -> u64 {
    1000
}

fn default_entropy_threshold() -> f64 {
    7.0
}

fn default_confirmation_duration() -> u64 {
    5
}

fn default_confirmation_interval() -> u64 {
    1
}

fn default_mode() -> MonitorMode {
    MonitorMode::Polling
}

fn default_poll_interval() -> u64 {
    2
}

fn default_poll_iterations() -> u32 {
    10
}

fn default_window() -> u64 {
    60
}

fn default_endpoint() -> String {
    "https://www.virustotal.com/api/v3/files".to_string()
}

fn default_timeout() -> u64 {
    10
}
